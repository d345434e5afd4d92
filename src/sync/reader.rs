//! Database side of a sync pass.

use super::scope::SyncScope;
use crate::error::StorageError;
use crate::paths;
use crate::store::{Datastore, RowFilter};
use crate::types::RecordKind;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Key used for a record during change set computation: folders carry a trailing slash
pub fn diff_key(path: &str, kind: RecordKind) -> String {
    match kind {
        RecordKind::File => path.to_string(),
        RecordKind::Folder => format!("{}/", path),
    }
}

/// Inverse of [`diff_key`]
pub fn split_diff_key(key: &str) -> (&str, RecordKind) {
    match key.strip_suffix('/') {
        Some(path) => (path, RecordKind::Folder),
        None => (key, RecordKind::File),
    }
}

/// What the database knows, keyed by diff key
#[derive(Debug, Clone, Default)]
pub struct DatabaseSnapshot {
    /// Records inside the search paths plus the scope's ancestor folders, sorted
    pub scoped_paths: Vec<String>,
    /// Hash of every record in the table
    pub hashes: HashMap<String, String>,
    /// Modification time of every record that has one
    pub last_modified: HashMap<String, i64>,
    /// UUID of every record in the table
    pub uuids: HashMap<String, Uuid>,
}

/// Loads existing records relevant to a sync pass
pub struct DatabaseEntryReader<'a> {
    store: &'a dyn Datastore,
    path_prefix: &'a str,
}

impl<'a> DatabaseEntryReader<'a> {
    /// `path_prefix` is the prefix under which this DBAFS stores its rows (`""` for none)
    pub fn new(store: &'a dyn Datastore, path_prefix: &'a str) -> Self {
        Self { store, path_prefix }
    }

    pub fn read(&self, scope: &SyncScope) -> Result<DatabaseSnapshot, StorageError> {
        let filter = if self.path_prefix.is_empty() {
            RowFilter::All
        } else {
            RowFilter::Children {
                parent: self.path_prefix.to_string(),
                deep: true,
            }
        };

        let mut snapshot = DatabaseSnapshot::default();
        for row in self.store.fetch_all(&filter)? {
            let Some(path) = paths::make_relative(&row.path, self.path_prefix) else {
                continue;
            };
            if path.is_empty() {
                continue;
            }

            let key = diff_key(path, row.kind);
            let in_scope = scope.covers(path)
                || (row.kind.is_directory() && scope.is_parent_path(path));
            if in_scope {
                snapshot.scoped_paths.push(key.clone());
            }
            if let Some(last_modified) = row.last_modified {
                snapshot.last_modified.insert(key.clone(), last_modified);
            }
            snapshot.uuids.insert(key.clone(), row.uuid);
            snapshot.hashes.insert(key, row.hash);
        }
        snapshot.scoped_paths.sort();

        debug!(
            total = snapshot.hashes.len(),
            in_scope = snapshot.scoped_paths.len(),
            "Loaded database entries"
        );
        Ok(snapshot)
    }
}
