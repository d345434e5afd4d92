//! Change set computation
//!
//! Diffs the walked filesystem state against the database snapshot. Folder
//! hashes are aggregated bottom-up from `hash ++ name` of their direct
//! children, sorted by name and joined with a NUL byte. Records that vanished
//! from one place and reappeared with the same hash elsewhere become moves.

use super::change_set::{ChangeSet, ItemToCreate, ItemToDelete, ItemToUpdate};
use super::reader::{split_diff_key, DatabaseSnapshot};
use super::scope::SyncScope;
use super::walker::{WalkEntry, Walked};
use crate::error::DbafsError;
use crate::hash::HashGenerator;
use crate::paths;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::info;

/// Per-folder accumulator: child name → `hash ++ name`, `None` for children known to be gone
type HashParts = BTreeMap<String, Option<String>>;

struct Discovered {
    key: String,
    hash: String,
    last_modified: Option<i64>,
}

/// Diffs filesystem state against database state
pub struct ChangeSetComputer<'a> {
    hasher: &'a HashGenerator,
    snapshot: &'a DatabaseSnapshot,
    scope: &'a SyncScope,
    track_last_modified: bool,
}

/// Aggregate hash of a folder from its children's `hash ++ name` parts
pub fn aggregate_directory_hash<'p>(
    hasher: &HashGenerator,
    parts: impl IntoIterator<Item = (&'p str, &'p str)>,
) -> String {
    let mut sorted: Vec<(&str, &str)> = parts.into_iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(_, part)| *part)
        .collect::<Vec<_>>()
        .join("\0");
    hasher.hash_string(&joined)
}

fn parent_key(path: &str) -> String {
    let parent = paths::parent(path);
    if parent.is_empty() {
        String::new()
    } else {
        format!("{}/", parent)
    }
}

impl<'a> ChangeSetComputer<'a> {
    pub fn new(
        hasher: &'a HashGenerator,
        snapshot: &'a DatabaseSnapshot,
        scope: &'a SyncScope,
        track_last_modified: bool,
    ) -> Self {
        Self {
            hasher,
            snapshot,
            scope,
            track_last_modified,
        }
    }

    /// Diff the walked entries (children before parents) against the snapshot
    pub fn compute<I>(&self, entries: I) -> Result<ChangeSet, DbafsError>
    where
        I: IntoIterator<Item = Result<WalkEntry, DbafsError>>,
    {
        let mut to_delete: BTreeSet<String> = self.snapshot.scoped_paths.iter().cloned().collect();
        let mut hash_parts: HashMap<String, HashParts> = HashMap::new();
        let mut discovered: Vec<Discovered> = Vec::new();
        let mut updates: Vec<ItemToUpdate> = Vec::new();
        let mut found: HashSet<String> = HashSet::new();

        for entry in entries {
            let WalkEntry { key, state } = entry?;
            let (path, kind) = split_diff_key(&key);
            let name = paths::basename(path).to_string();

            let (hash, last_modified) = match state {
                Walked::Missing => {
                    if kind.is_directory() {
                        self.delete_stored_subtree(path, &found, &mut to_delete);
                    }
                    hash_parts
                        .entry(parent_key(path))
                        .or_default()
                        .insert(name, None);
                    continue;
                }
                Walked::File {
                    hash,
                    last_modified,
                } => (hash, last_modified),
                Walked::Directory => {
                    let parts = hash_parts.remove(&key).unwrap_or_default();
                    (self.directory_hash(&key, path, parts), None)
                }
            };

            hash_parts
                .entry(parent_key(path))
                .or_default()
                .insert(name.clone(), Some(format!("{}{}", hash, name)));

            match self.snapshot.hashes.get(&key) {
                None => discovered.push(Discovered {
                    key: key.clone(),
                    hash,
                    last_modified: last_modified.filter(|_| self.track_last_modified),
                }),
                Some(old_hash) => {
                    let new_hash = (*old_hash != hash).then_some(hash);
                    let new_last_modified = self.changed_last_modified(&key, last_modified);
                    if new_hash.is_some() || new_last_modified.is_some() {
                        updates.push(ItemToUpdate {
                            existing_path: path.to_string(),
                            kind,
                            new_path: None,
                            new_hash,
                            new_last_modified,
                        });
                    }
                }
            }

            to_delete.remove(&key);
            found.insert(key);
        }

        let mut items_to_create = Vec::new();
        let mut moves = 0usize;
        for item in discovered {
            match self.find_move_source(&item, &to_delete) {
                Some(old_key) => {
                    to_delete.remove(&old_key);
                    let (old_path, kind) = split_diff_key(&old_key);
                    let (new_path, _) = split_diff_key(&item.key);
                    updates.push(ItemToUpdate {
                        existing_path: old_path.to_string(),
                        kind,
                        new_path: Some(new_path.to_string()),
                        new_hash: None,
                        new_last_modified: self.changed_last_modified(&old_key, item.last_modified),
                    });
                    moves += 1;
                }
                None => {
                    let (path, kind) = split_diff_key(&item.key);
                    items_to_create.push(ItemToCreate {
                        path: path.to_string(),
                        hash: item.hash,
                        kind,
                        last_modified: item.last_modified,
                    });
                }
            }
        }

        // Discovery order is children first; inserts need parents first.
        items_to_create.reverse();

        if moves > 0 {
            updates.sort_by(|a, b| b.existing_path.cmp(&a.existing_path));
        } else {
            updates.reverse();
        }

        let items_to_delete: Vec<ItemToDelete> = to_delete
            .iter()
            .rev()
            .map(|key| {
                let (path, kind) = split_diff_key(key);
                ItemToDelete {
                    path: path.to_string(),
                    kind,
                }
            })
            .collect();

        info!(
            create = items_to_create.len(),
            update = updates.len(),
            delete = items_to_delete.len(),
            moves,
            "Computed change set"
        );

        Ok(ChangeSet::new(items_to_create, updates, items_to_delete))
    }

    fn directory_hash(&self, key: &str, path: &str, mut parts: HashParts) -> String {
        // Ancestors pulled in for context were not traversed: their untouched
        // children contribute with the hashes recorded in the database.
        if self.scope.is_partial() && self.scope.is_parent_path(path) {
            for (child_key, child_hash) in &self.snapshot.hashes {
                if !paths::is_direct_child(key, child_key) {
                    continue;
                }
                let child_name = paths::basename(child_key);
                parts
                    .entry(child_name.to_string())
                    .or_insert_with(|| Some(format!("{}{}", child_hash, child_name)));
            }
        }

        aggregate_directory_hash(
            self.hasher,
            parts
                .iter()
                .filter_map(|(name, part)| part.as_deref().map(|p| (name.as_str(), p))),
        )
    }

    /// A vanished folder takes every stored record below it along, including
    /// records outside the scope that would otherwise keep a dangling parent.
    fn delete_stored_subtree(
        &self,
        path: &str,
        found: &HashSet<String>,
        to_delete: &mut BTreeSet<String>,
    ) {
        for key in self.snapshot.hashes.keys() {
            let (stored_path, _) = split_diff_key(key);
            if paths::is_base_path(path, stored_path) && !found.contains(key) {
                to_delete.insert(key.clone());
            }
        }
    }

    fn changed_last_modified(&self, key: &str, current: Option<i64>) -> Option<i64> {
        if !self.track_last_modified {
            return None;
        }
        current.filter(|lm| self.snapshot.last_modified.get(key) != Some(lm))
    }

    /// Orphan that `item` was moved from: same kind and hash, disambiguated by name
    fn find_move_source(&self, item: &Discovered, orphans: &BTreeSet<String>) -> Option<String> {
        let (_, kind) = split_diff_key(&item.key);
        let mut candidates: Vec<&String> = orphans
            .iter()
            .filter(|orphan| {
                split_diff_key(orphan).1 == kind
                    && self.snapshot.hashes.get(orphan.as_str()) == Some(&item.hash)
            })
            .collect();

        if candidates.len() > 1 {
            let name = paths::basename(&item.key);
            candidates.retain(|candidate| paths::basename(candidate) == name);
        }

        match candidates.as_slice() {
            [single] => Some((*single).clone()),
            _ => None,
        }
    }
}
