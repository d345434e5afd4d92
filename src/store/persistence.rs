//! Sled-backed datastore
//!
//! One table maps onto three sled trees:
//! `<table>.records` (path → bincode row), `<table>.uuids` (uuid → path) and
//! `<table>.ids` (big-endian id → path). Commits run as a single sled
//! transaction across all three trees.

use super::{Datastore, Mutation, RecordRow, RowFilter};
use crate::error::StorageError;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use tracing::debug;

/// Datastore persisting one DBAFS table in sled
#[derive(Clone)]
pub struct SledDatastore {
    db: Db,
    records: Tree,
    uuids: Tree,
    ids: Tree,
}

fn abort<T>(error: StorageError) -> ConflictableTransactionResult<T, StorageError> {
    Err(ConflictableTransactionError::Abort(error))
}

fn decode(bytes: &[u8]) -> Result<RecordRow, StorageError> {
    Ok(bincode::deserialize(bytes)?)
}

fn encode(row: &RecordRow) -> Result<Vec<u8>, StorageError> {
    Ok(bincode::serialize(row)?)
}

fn read_row(
    records: &TransactionalTree,
    path: &str,
) -> ConflictableTransactionResult<Option<RecordRow>, StorageError> {
    match records.get(path.as_bytes())? {
        Some(bytes) => match decode(&bytes) {
            Ok(row) => Ok(Some(row)),
            Err(e) => abort(e),
        },
        None => Ok(None),
    }
}

fn write_row(
    records: &TransactionalTree,
    uuids: &TransactionalTree,
    ids: &TransactionalTree,
    row: &RecordRow,
) -> ConflictableTransactionResult<(), StorageError> {
    let encoded = match encode(row) {
        Ok(bytes) => bytes,
        Err(e) => return abort(e),
    };
    records.insert(row.path.as_bytes(), encoded)?;
    uuids.insert(&row.uuid.as_bytes()[..], row.path.as_bytes())?;
    ids.insert(row.id.to_be_bytes().to_vec(), row.path.as_bytes())?;
    Ok(())
}

impl SledDatastore {
    /// Open (or create) a sled database at `path` and use `table` within it
    pub fn open(path: &Path, table: &str) -> Result<Self, StorageError> {
        std::fs::create_dir_all(path)?;
        let db = sled::open(path)?;
        Self::from_db(db, table)
    }

    pub fn from_db(db: Db, table: &str) -> Result<Self, StorageError> {
        let records = db.open_tree(format!("{}.records", table))?;
        let uuids = db.open_tree(format!("{}.uuids", table))?;
        let ids = db.open_tree(format!("{}.ids", table))?;
        Ok(Self {
            db,
            records,
            uuids,
            ids,
        })
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn row_by_path(&self, path: &[u8]) -> Result<Option<RecordRow>, StorageError> {
        match self.records.get(path)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn row_by_index(&self, index: &Tree, key: &[u8]) -> Result<Option<RecordRow>, StorageError> {
        match index.get(key)? {
            Some(path) => self.row_by_path(&path),
            None => Ok(None),
        }
    }

    fn scan(&self, prefix: &str, filter: &RowFilter) -> Result<Vec<RecordRow>, StorageError> {
        let mut rows = Vec::new();
        for entry in self.records.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = entry?;
            let row = decode(&bytes)?;
            if filter.matches(&row) {
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

impl Datastore for SledDatastore {
    fn fetch_all(&self, filter: &RowFilter) -> Result<Vec<RecordRow>, StorageError> {
        let rows = match filter {
            RowFilter::All => self.scan("", filter)?,
            RowFilter::Path(path) => self.row_by_path(path.as_bytes())?.into_iter().collect(),
            RowFilter::Uuid(uuid) => self
                .row_by_index(&self.uuids, &uuid.as_bytes()[..])?
                .into_iter()
                .collect(),
            RowFilter::Id(id) => self
                .row_by_index(&self.ids, &id.to_be_bytes())?
                .into_iter()
                .collect(),
            RowFilter::Children { parent, .. } if parent.is_empty() => self.scan("", filter)?,
            RowFilter::Children { parent, .. } => self.scan(&format!("{}/", parent), filter)?,
        };
        Ok(rows)
    }

    fn commit(&self, mutations: &[Mutation]) -> Result<(), StorageError> {
        let insert_count: usize = mutations
            .iter()
            .map(|m| match m {
                Mutation::Insert(rows) => rows.len(),
                _ => 0,
            })
            .sum();
        let new_ids = (0..insert_count)
            .map(|_| self.db.generate_id())
            .collect::<Result<Vec<u64>, sled::Error>>()?;

        let result = (&self.records, &self.uuids, &self.ids).transaction(
            |(records, uuids, ids)| {
                let mut next_id = new_ids.iter().copied();
                for mutation in mutations {
                    match mutation {
                        Mutation::Insert(rows) => {
                            for new_row in rows {
                                if records.get(new_row.path.as_bytes())?.is_some() {
                                    return abort(StorageError::Constraint(format!(
                                        "duplicate path \"{}\"",
                                        new_row.path
                                    )));
                                }
                                if uuids.get(&new_row.uuid.as_bytes()[..])?.is_some() {
                                    return abort(StorageError::Constraint(format!(
                                        "duplicate uuid {}",
                                        new_row.uuid
                                    )));
                                }
                                let Some(id) = next_id.next() else {
                                    return abort(StorageError::Backend(
                                        "ran out of preallocated ids".to_string(),
                                    ));
                                };
                                write_row(records, uuids, ids, &new_row.clone().into_row(id))?;
                            }
                        }
                        Mutation::Update { path, changes } => {
                            let Some(mut row) = read_row(records, path)? else {
                                return abort(StorageError::Constraint(format!(
                                    "no row to update at \"{}\"",
                                    path
                                )));
                            };
                            changes.apply_to(&mut row);
                            if row.path != *path {
                                if records.get(row.path.as_bytes())?.is_some() {
                                    return abort(StorageError::Constraint(format!(
                                        "duplicate path \"{}\"",
                                        row.path
                                    )));
                                }
                                records.remove(path.as_bytes())?;
                            }
                            write_row(records, uuids, ids, &row)?;
                        }
                        Mutation::Delete { path } => {
                            if let Some(row) = read_row(records, path)? {
                                records.remove(path.as_bytes())?;
                                uuids.remove(&row.uuid.as_bytes()[..])?;
                                ids.remove(row.id.to_be_bytes().to_vec())?;
                            }
                        }
                    }
                }
                Ok(())
            },
        );

        match result {
            Ok(()) => {
                debug!(mutations = mutations.len(), "Sled transaction committed");
                Ok(())
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }
}
