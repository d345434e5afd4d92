//! Record Store
//!
//! Row-level storage for DBAFS records. A [`Datastore`] serves one table:
//! rows are unique by `path`, `uuid` and `id`. Writes go through a
//! [`Transaction`], which stages mutations and hands them to the datastore to be
//! applied atomically on commit. Dropping a transaction without committing
//! discards it.

pub mod memory;
pub mod persistence;

pub use memory::MemoryDatastore;
pub use persistence::SledDatastore;

use crate::error::StorageError;
use crate::paths;
use crate::types::RecordKind;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// A persisted record row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRow {
    pub id: u64,
    pub uuid: Uuid,
    /// Parent folder UUID; `None` for root-level entries
    pub pid: Option<Uuid>,
    pub path: String,
    pub hash: String,
    /// Denormalized basename of `path`
    pub name: String,
    pub kind: RecordKind,
    /// Last write, seconds since the epoch
    pub tstamp: i64,
    pub last_modified: Option<i64>,
}

/// A row to insert; the datastore assigns the `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecordRow {
    pub uuid: Uuid,
    pub pid: Option<Uuid>,
    pub path: String,
    pub hash: String,
    pub name: String,
    pub kind: RecordKind,
    pub tstamp: i64,
    pub last_modified: Option<i64>,
}

impl NewRecordRow {
    pub fn into_row(self, id: u64) -> RecordRow {
        RecordRow {
            id,
            uuid: self.uuid,
            pid: self.pid,
            path: self.path,
            hash: self.hash,
            name: self.name,
            kind: self.kind,
            tstamp: self.tstamp,
            last_modified: self.last_modified,
        }
    }
}

/// Partial row update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowChanges {
    pub path: Option<String>,
    pub pid: Option<Option<Uuid>>,
    pub hash: Option<String>,
    pub last_modified: Option<Option<i64>>,
    pub tstamp: Option<i64>,
}

impl RowChanges {
    /// Apply the changes to a row in place
    pub fn apply_to(&self, row: &mut RecordRow) {
        if let Some(path) = &self.path {
            row.path = path.clone();
            row.name = paths::basename(path).to_string();
        }
        if let Some(pid) = self.pid {
            row.pid = pid;
        }
        if let Some(hash) = &self.hash {
            row.hash = hash.clone();
        }
        if let Some(last_modified) = self.last_modified {
            row.last_modified = last_modified;
        }
        if let Some(tstamp) = self.tstamp {
            row.tstamp = tstamp;
        }
    }
}

/// Row selection for [`Datastore::fetch_all`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    All,
    Path(String),
    Uuid(Uuid),
    Id(u64),
    /// Rows below `parent` (`""` is the table root); `deep` includes all descendants
    Children { parent: String, deep: bool },
}

impl RowFilter {
    pub fn matches(&self, row: &RecordRow) -> bool {
        match self {
            RowFilter::All => true,
            RowFilter::Path(path) => row.path == *path,
            RowFilter::Uuid(uuid) => row.uuid == *uuid,
            RowFilter::Id(id) => row.id == *id,
            RowFilter::Children { parent, deep } => {
                if *deep {
                    row.path != *parent && paths::is_base_path(parent, &row.path)
                } else {
                    paths::is_direct_child(parent, &row.path)
                }
            }
        }
    }
}

/// A staged write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Insert(Vec<NewRecordRow>),
    Update { path: String, changes: RowChanges },
    Delete { path: String },
}

/// Transactional row storage for one DBAFS table
pub trait Datastore: Send + Sync {
    /// Fetch rows matching `filter`, ordered by path
    fn fetch_all(&self, filter: &RowFilter) -> Result<Vec<RecordRow>, StorageError>;

    /// Apply all mutations atomically, in order: either every mutation lands or none does
    fn commit(&self, mutations: &[Mutation]) -> Result<(), StorageError>;

    fn fetch_one(&self, filter: &RowFilter) -> Result<Option<RecordRow>, StorageError> {
        Ok(self.fetch_all(filter)?.into_iter().next())
    }
}

/// Write transaction staging mutations until [`Transaction::commit`]
pub struct Transaction<'a> {
    store: &'a dyn Datastore,
    mutations: Vec<Mutation>,
}

impl<'a> Transaction<'a> {
    pub fn begin(store: &'a dyn Datastore) -> Self {
        Self {
            store,
            mutations: Vec::new(),
        }
    }

    pub fn insert(&mut self, row: NewRecordRow) {
        self.mutations.push(Mutation::Insert(vec![row]));
    }

    pub fn bulk_insert(&mut self, rows: Vec<NewRecordRow>) {
        if !rows.is_empty() {
            self.mutations.push(Mutation::Insert(rows));
        }
    }

    pub fn update(&mut self, path: &str, changes: RowChanges) {
        self.mutations.push(Mutation::Update {
            path: path.to_string(),
            changes,
        });
    }

    pub fn delete(&mut self, path: &str) {
        self.mutations.push(Mutation::Delete {
            path: path.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn commit(self) -> Result<(), StorageError> {
        if self.mutations.is_empty() {
            return Ok(());
        }
        debug!(mutations = self.mutations.len(), "Committing transaction");
        self.store.commit(&self.mutations)
    }

    pub fn rollback(self) {
        debug!(mutations = self.mutations.len(), "Rolling back transaction");
    }
}
