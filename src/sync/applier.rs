//! Applies a change set to the datastore in a single transaction.

use super::change_set::{ChangeSet, ItemToUpdate};
use super::reader::diff_key;
use crate::error::DbafsError;
use crate::paths;
use crate::store::{Datastore, NewRecordRow, RowChanges, Transaction};
use crate::types::RecordKind;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

pub const DEFAULT_BULK_INSERT_SIZE: usize = 100;

/// Writes change sets into one DBAFS table
pub struct ChangeSetApplier<'a> {
    store: &'a dyn Datastore,
    path_prefix: &'a str,
    bulk_insert_size: usize,
}

impl<'a> ChangeSetApplier<'a> {
    pub fn new(store: &'a dyn Datastore, path_prefix: &'a str, bulk_insert_size: usize) -> Self {
        Self {
            store,
            path_prefix,
            bulk_insert_size: bulk_insert_size.max(1),
        }
    }

    /// Apply `change_set`; `uuids` maps diff keys of existing records to their UUIDs
    /// and is extended with every folder created on the way.
    ///
    /// Either every change lands or none does.
    pub fn apply(
        &self,
        change_set: &ChangeSet,
        uuids: &mut HashMap<String, Uuid>,
    ) -> Result<(), DbafsError> {
        let now = Utc::now().timestamp();
        let mut tx = Transaction::begin(self.store);

        // Moved folders keep their UUID: children created or moved into the
        // new location must resolve it before the folder row itself moves.
        for item in change_set.items_to_update() {
            if let (RecordKind::Folder, Some(new_path)) = (item.kind, &item.new_path) {
                let old_key = diff_key(&item.existing_path, RecordKind::Folder);
                if let Some(uuid) = uuids.get(&old_key).copied() {
                    uuids.insert(diff_key(new_path, RecordKind::Folder), uuid);
                }
            }
        }

        // Every created row gets its UUID up front, so any update below can
        // resolve a parent created in the same pass.
        let created_uuids: Vec<Uuid> = change_set
            .items_to_create()
            .iter()
            .map(|item| {
                let uuid = Uuid::now_v7();
                if item.is_directory() {
                    uuids.insert(diff_key(&item.path, RecordKind::Folder), uuid);
                }
                uuid
            })
            .collect();

        // A path vacated by a type change is reused in the same pass.
        let created: HashSet<&str> = change_set
            .items_to_create()
            .iter()
            .map(|item| item.path.as_str())
            .collect();
        let reused: HashSet<&str> = created
            .iter()
            .copied()
            .chain(
                change_set
                    .items_to_update()
                    .iter()
                    .filter_map(|item| item.new_path.as_deref()),
            )
            .collect();
        let (early_deletes, deletes): (Vec<_>, Vec<_>) = change_set
            .items_to_delete()
            .iter()
            .partition(|item| reused.contains(item.path.as_str()));
        for item in &early_deletes {
            tx.delete(&self.database_path(&item.path));
        }

        // Rows moved away from a path that a create reuses must leave before the insert.
        let (vacating, updates): (Vec<_>, Vec<_>) = change_set
            .items_to_update()
            .iter()
            .partition(|item| item.updates_path() && created.contains(item.existing_path.as_str()));
        for item in &vacating {
            debug!(path = %item.existing_path, "Moving row out of a reused path");
            self.stage_update(&mut tx, item, now, uuids)?;
        }

        let mut batch = Vec::with_capacity(self.bulk_insert_size);
        for (item, uuid) in change_set.items_to_create().iter().zip(created_uuids) {
            let pid = self.parent_uuid(&item.path, uuids)?;
            batch.push(NewRecordRow {
                uuid,
                pid,
                path: self.database_path(&item.path),
                hash: item.hash.clone(),
                name: paths::basename(&item.path).to_string(),
                kind: item.kind,
                tstamp: now,
                last_modified: item.last_modified,
            });

            if batch.len() >= self.bulk_insert_size {
                debug!(rows = batch.len(), "Staging bulk insert");
                tx.bulk_insert(std::mem::take(&mut batch));
            }
        }
        tx.bulk_insert(batch);

        for item in &updates {
            self.stage_update(&mut tx, item, now, uuids)?;
        }

        for item in &deletes {
            tx.delete(&self.database_path(&item.path));
        }

        tx.commit()?;
        info!(
            created = change_set.items_to_create().len(),
            updated = change_set.items_to_update().len(),
            deleted = change_set.items_to_delete().len(),
            "Applied change set"
        );
        Ok(())
    }

    fn stage_update(
        &self,
        tx: &mut Transaction<'_>,
        item: &ItemToUpdate,
        now: i64,
        uuids: &HashMap<String, Uuid>,
    ) -> Result<(), DbafsError> {
        let mut changes = RowChanges {
            tstamp: Some(now),
            hash: item.new_hash.clone(),
            last_modified: item.new_last_modified.map(Some),
            ..RowChanges::default()
        };
        if let Some(new_path) = &item.new_path {
            changes.path = Some(self.database_path(new_path));
            changes.pid = Some(self.parent_uuid(new_path, uuids)?);
        }
        tx.update(&self.database_path(&item.existing_path), changes);
        Ok(())
    }

    fn parent_uuid(
        &self,
        path: &str,
        uuids: &HashMap<String, Uuid>,
    ) -> Result<Option<Uuid>, DbafsError> {
        let parent = paths::parent(path);
        if parent.is_empty() {
            return Ok(None);
        }
        uuids
            .get(&diff_key(parent, RecordKind::Folder))
            .copied()
            .map(Some)
            .ok_or_else(|| DbafsError::MissingParent(path.to_string()))
    }

    fn database_path(&self, path: &str) -> String {
        paths::join(self.path_prefix, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryDatastore, RowFilter};
    use crate::sync::change_set::{ItemToCreate, ItemToDelete, ItemToUpdate};

    fn create(path: &str, kind: RecordKind) -> ItemToCreate {
        ItemToCreate {
            path: path.to_string(),
            hash: format!("h:{}", path),
            kind,
            last_modified: None,
        }
    }

    fn fetch(store: &MemoryDatastore, path: &str) -> Option<crate::store::RecordRow> {
        store.fetch_one(&RowFilter::Path(path.to_string())).unwrap()
    }

    #[test]
    fn test_creates_link_children_to_parents() {
        let store = MemoryDatastore::new();
        let change_set = ChangeSet::new(
            vec![
                create("a", RecordKind::Folder),
                create("a/b", RecordKind::Folder),
                create("a/b/c.txt", RecordKind::File),
            ],
            vec![],
            vec![],
        );

        let mut uuids = HashMap::new();
        ChangeSetApplier::new(&store, "", 2)
            .apply(&change_set, &mut uuids)
            .unwrap();

        let a = fetch(&store, "a").unwrap();
        let b = fetch(&store, "a/b").unwrap();
        let c = fetch(&store, "a/b/c.txt").unwrap();
        assert_eq!(a.pid, None);
        assert_eq!(b.pid, Some(a.uuid));
        assert_eq!(c.pid, Some(b.uuid));
        assert_eq!(c.name, "c.txt");
        assert_eq!(uuids["a/b/"], b.uuid);
    }

    #[test]
    fn test_missing_parent_rolls_back() {
        let store = MemoryDatastore::new();
        let change_set = ChangeSet::new(
            vec![
                create("ok.txt", RecordKind::File),
                create("nowhere/x.txt", RecordKind::File),
            ],
            vec![],
            vec![],
        );

        let err = ChangeSetApplier::new(&store, "", DEFAULT_BULK_INSERT_SIZE)
            .apply(&change_set, &mut HashMap::new())
            .unwrap_err();
        assert!(matches!(err, DbafsError::MissingParent(path) if path == "nowhere/x.txt"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_moved_folder_keeps_uuid_and_reparents_children() {
        let store = MemoryDatastore::new();
        let mut uuids = HashMap::new();
        ChangeSetApplier::new(&store, "", DEFAULT_BULK_INSERT_SIZE)
            .apply(
                &ChangeSet::new(
                    vec![
                        create("a", RecordKind::Folder),
                        create("a/f.txt", RecordKind::File),
                    ],
                    vec![],
                    vec![],
                ),
                &mut uuids,
            )
            .unwrap();
        let folder_uuid = fetch(&store, "a").unwrap().uuid;

        let move_set = ChangeSet::new(
            vec![create("b/new.txt", RecordKind::File)],
            vec![
                ItemToUpdate {
                    existing_path: "a/f.txt".to_string(),
                    kind: RecordKind::File,
                    new_path: Some("b/f.txt".to_string()),
                    new_hash: None,
                    new_last_modified: None,
                },
                ItemToUpdate {
                    existing_path: "a".to_string(),
                    kind: RecordKind::Folder,
                    new_path: Some("b".to_string()),
                    new_hash: Some("changed".to_string()),
                    new_last_modified: None,
                },
            ],
            vec![],
        );
        ChangeSetApplier::new(&store, "", DEFAULT_BULK_INSERT_SIZE)
            .apply(&move_set, &mut uuids)
            .unwrap();

        assert!(fetch(&store, "a").is_none());
        let b = fetch(&store, "b").unwrap();
        assert_eq!(b.uuid, folder_uuid);
        assert_eq!(b.hash, "changed");
        assert_eq!(b.name, "b");
        assert_eq!(fetch(&store, "b/f.txt").unwrap().pid, Some(folder_uuid));
        assert_eq!(fetch(&store, "b/new.txt").unwrap().pid, Some(folder_uuid));
    }

    #[test]
    fn test_type_change_reuses_path() {
        let store = MemoryDatastore::new();
        let mut uuids = HashMap::new();
        let applier = ChangeSetApplier::new(&store, "files", DEFAULT_BULK_INSERT_SIZE);
        applier
            .apply(
                &ChangeSet::new(vec![create("x", RecordKind::Folder)], vec![], vec![]),
                &mut uuids,
            )
            .unwrap();

        applier
            .apply(
                &ChangeSet::new(
                    vec![create("x", RecordKind::File)],
                    vec![],
                    vec![ItemToDelete {
                        path: "x".to_string(),
                        kind: RecordKind::Folder,
                    }],
                ),
                &mut uuids,
            )
            .unwrap();

        let row = fetch(&store, "files/x").unwrap();
        assert_eq!(row.kind, RecordKind::File);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_move_out_of_reused_path_into_new_folder() {
        let store = MemoryDatastore::new();
        let mut uuids = HashMap::new();
        let applier = ChangeSetApplier::new(&store, "", DEFAULT_BULK_INSERT_SIZE);
        applier
            .apply(
                &ChangeSet::new(
                    vec![
                        create("x", RecordKind::Folder),
                        create("x/f.txt", RecordKind::File),
                    ],
                    vec![],
                    vec![],
                ),
                &mut uuids,
            )
            .unwrap();
        let folder_uuid = fetch(&store, "x").unwrap().uuid;
        let file_uuid = fetch(&store, "x/f.txt").unwrap().uuid;

        let moved = |from: &str, to: &str, kind| ItemToUpdate {
            existing_path: from.to_string(),
            kind,
            new_path: Some(to.to_string()),
            new_hash: None,
            new_last_modified: None,
        };
        applier
            .apply(
                &ChangeSet::new(
                    vec![create("n", RecordKind::Folder), create("x", RecordKind::File)],
                    vec![
                        moved("x/f.txt", "n/z/f.txt", RecordKind::File),
                        moved("x", "n/z", RecordKind::Folder),
                    ],
                    vec![],
                ),
                &mut uuids,
            )
            .unwrap();

        let new_folder = fetch(&store, "n").unwrap();
        let moved_folder = fetch(&store, "n/z").unwrap();
        assert_eq!(moved_folder.uuid, folder_uuid);
        assert_eq!(moved_folder.pid, Some(new_folder.uuid));
        let moved_file = fetch(&store, "n/z/f.txt").unwrap();
        assert_eq!(moved_file.uuid, file_uuid);
        assert_eq!(moved_file.pid, Some(folder_uuid));
        let file = fetch(&store, "x").unwrap();
        assert_eq!(file.kind, RecordKind::File);
        assert_eq!(file.pid, None);
        assert_eq!(store.len(), 4);
    }
}
