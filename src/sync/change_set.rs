//! Change sets: the diff between the database and the filesystem.

use crate::paths;
use crate::types::RecordKind;
use serde::{Deserialize, Serialize};

/// A record to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemToCreate {
    pub path: String,
    pub hash: String,
    pub kind: RecordKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<i64>,
}

impl ItemToCreate {
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }
}

/// A partial update of an existing record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemToUpdate {
    pub existing_path: String,
    pub kind: RecordKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_last_modified: Option<i64>,
}

impl ItemToUpdate {
    pub fn updates_path(&self) -> bool {
        self.new_path.is_some()
    }

    pub fn updates_hash(&self) -> bool {
        self.new_hash.is_some()
    }

    pub fn updates_last_modified(&self) -> bool {
        self.new_last_modified.is_some()
    }

    /// Whether the modification time is the only thing that changed
    pub fn is_last_modified_only(&self) -> bool {
        !self.updates_path() && !self.updates_hash()
    }

    /// Path of the record after the update
    pub fn target_path(&self) -> &str {
        self.new_path.as_deref().unwrap_or(&self.existing_path)
    }
}

/// A record to delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemToDelete {
    pub path: String,
    pub kind: RecordKind,
}

/// Immutable set of changes produced by a sync pass.
///
/// Creates are ordered parents first, updates in the order they must be
/// applied, deletes last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    items_to_create: Vec<ItemToCreate>,
    items_to_update: Vec<ItemToUpdate>,
    items_to_delete: Vec<ItemToDelete>,
}

impl ChangeSet {
    pub fn new(
        items_to_create: Vec<ItemToCreate>,
        items_to_update: Vec<ItemToUpdate>,
        items_to_delete: Vec<ItemToDelete>,
    ) -> Self {
        Self {
            items_to_create,
            items_to_update,
            items_to_delete,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn items_to_create(&self) -> &[ItemToCreate] {
        &self.items_to_create
    }

    pub fn items_to_update(&self) -> &[ItemToUpdate] {
        &self.items_to_update
    }

    pub fn items_to_delete(&self) -> &[ItemToDelete] {
        &self.items_to_delete
    }

    /// Whether there is nothing to do.
    ///
    /// Updates that only touch the modification time count as changes only
    /// with `include_last_modified`.
    pub fn is_empty(&self, include_last_modified: bool) -> bool {
        self.items_to_create.is_empty()
            && self.items_to_delete.is_empty()
            && self
                .items_to_update
                .iter()
                .all(|item| !include_last_modified && item.is_last_modified_only())
    }

    /// Number of individual changes
    pub fn len(&self) -> usize {
        self.items_to_create.len() + self.items_to_update.len() + self.items_to_delete.len()
    }

    /// Append `other` with all of its paths moved below `prefix`
    pub fn with_other(mut self, other: ChangeSet, prefix: &str) -> Self {
        let prefixed = |path: &str| paths::join(prefix, path);

        self.items_to_create
            .extend(other.items_to_create.into_iter().map(|mut item| {
                item.path = prefixed(&item.path);
                item
            }));
        self.items_to_update
            .extend(other.items_to_update.into_iter().map(|mut item| {
                item.existing_path = prefixed(&item.existing_path);
                item.new_path = item.new_path.as_deref().map(prefixed);
                item
            }));
        self.items_to_delete
            .extend(other.items_to_delete.into_iter().map(|mut item| {
                item.path = prefixed(&item.path);
                item
            }));
        self
    }
}
