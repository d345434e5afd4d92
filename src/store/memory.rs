//! In-memory datastore
//!
//! Commits apply to a copy of the table which replaces the live table only
//! when every mutation succeeded.

use super::{Datastore, Mutation, RecordRow, RowFilter};
use crate::error::StorageError;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct Table {
    rows: BTreeMap<String, RecordRow>,
    paths_by_uuid: HashMap<Uuid, String>,
    next_id: u64,
}

impl Table {
    fn apply(&mut self, mutation: &Mutation) -> Result<(), StorageError> {
        match mutation {
            Mutation::Insert(rows) => {
                for new_row in rows {
                    if self.rows.contains_key(&new_row.path) {
                        return Err(StorageError::Constraint(format!(
                            "duplicate path \"{}\"",
                            new_row.path
                        )));
                    }
                    if self.paths_by_uuid.contains_key(&new_row.uuid) {
                        return Err(StorageError::Constraint(format!(
                            "duplicate uuid {}",
                            new_row.uuid
                        )));
                    }
                    self.next_id += 1;
                    let row = new_row.clone().into_row(self.next_id);
                    self.paths_by_uuid.insert(row.uuid, row.path.clone());
                    self.rows.insert(row.path.clone(), row);
                }
            }
            Mutation::Update { path, changes } => {
                let mut row = self.rows.remove(path).ok_or_else(|| {
                    StorageError::Constraint(format!("no row to update at \"{}\"", path))
                })?;
                changes.apply_to(&mut row);
                if row.path != *path && self.rows.contains_key(&row.path) {
                    return Err(StorageError::Constraint(format!(
                        "duplicate path \"{}\"",
                        row.path
                    )));
                }
                self.paths_by_uuid.insert(row.uuid, row.path.clone());
                self.rows.insert(row.path.clone(), row);
            }
            Mutation::Delete { path } => {
                if let Some(row) = self.rows.remove(path) {
                    self.paths_by_uuid.remove(&row.uuid);
                }
            }
        }
        Ok(())
    }
}

/// Datastore keeping a single table in memory
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    table: RwLock<Table>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().rows.is_empty()
    }
}

impl Datastore for MemoryDatastore {
    fn fetch_all(&self, filter: &RowFilter) -> Result<Vec<RecordRow>, StorageError> {
        let table = self.table.read();
        let rows = match filter {
            RowFilter::Path(path) => table.rows.get(path).cloned().into_iter().collect(),
            RowFilter::Uuid(uuid) => table
                .paths_by_uuid
                .get(uuid)
                .and_then(|path| table.rows.get(path))
                .cloned()
                .into_iter()
                .collect(),
            _ => table
                .rows
                .values()
                .filter(|row| filter.matches(row))
                .cloned()
                .collect(),
        };
        Ok(rows)
    }

    fn commit(&self, mutations: &[Mutation]) -> Result<(), StorageError> {
        let mut table = self.table.write();
        let mut staged = table.clone();
        for mutation in mutations {
            staged.apply(mutation)?;
        }
        *table = staged;
        Ok(())
    }
}
