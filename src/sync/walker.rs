//! Filesystem side of a sync pass.
//!
//! The walker yields every visited resource children-first, so that a folder
//! shows up only after all of its traversed children. File hashes are computed
//! on the way; folder hashes are left to the change set computer.

use super::reader::{diff_key, DatabaseSnapshot};
use super::scope::SyncScope;
use crate::error::DbafsError;
use crate::filesystem::{FilesystemAdapter, FilesystemItem};
use crate::hash::{FileHash, HashContext, HashGenerator};
use crate::paths;
use crate::types::RecordKind;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, trace};

/// A folder containing this file is not synchronized, nor is anything below it
pub const EXCLUDE_MARKER: &str = ".nosync";

/// Visibility marker; the file itself is never synchronized
pub const PUBLIC_MARKER: &str = ".public";

/// State of a visited resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Walked {
    File {
        hash: String,
        last_modified: Option<i64>,
    },
    /// Hash is derived from the children later on
    Directory,
    /// Explicitly requested but not present (or not eligible for syncing)
    Missing,
}

/// One visited resource; `key` is the diff key (folders end with a slash)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub key: String,
    pub state: Walked,
}

impl WalkEntry {
    fn directory(path: &str) -> Self {
        Self {
            key: diff_key(path, RecordKind::Folder),
            state: Walked::Directory,
        }
    }

    fn missing(path: &str) -> Self {
        Self {
            key: path.to_string(),
            state: Walked::Missing,
        }
    }

    fn missing_directory(path: &str) -> Self {
        Self {
            key: diff_key(path, RecordKind::Folder),
            state: Walked::Missing,
        }
    }
}

struct Frame {
    path: String,
    pending_dirs: VecDeque<String>,
}

/// Post-order traversal over the search scope.
///
/// Consumed exactly once: marker checks and hashing happen while iterating.
/// After the first error the iterator is exhausted.
pub struct FilesystemWalker<'a> {
    filesystem: &'a dyn FilesystemAdapter,
    hasher: &'a HashGenerator,
    snapshot: &'a DatabaseSnapshot,
    max_file_size: Option<u64>,
    search_paths: VecDeque<String>,
    parent_paths: VecDeque<String>,
    stack: Vec<Frame>,
    ready: VecDeque<WalkEntry>,
    listings: HashMap<String, HashMap<String, FilesystemItem>>,
    failed: bool,
}

impl<'a> FilesystemWalker<'a> {
    pub fn new(
        filesystem: &'a dyn FilesystemAdapter,
        hasher: &'a HashGenerator,
        snapshot: &'a DatabaseSnapshot,
        scope: &SyncScope,
        max_file_size: Option<u64>,
    ) -> Self {
        Self {
            filesystem,
            hasher,
            snapshot,
            max_file_size: max_file_size.filter(|max| *max > 0),
            search_paths: scope.search_paths.iter().cloned().collect(),
            parent_paths: scope.parent_paths.iter().cloned().collect(),
            stack: Vec::new(),
            ready: VecDeque::new(),
            listings: HashMap::new(),
            failed: false,
        }
    }

    fn advance(&mut self) -> Result<bool, DbafsError> {
        if let Some(frame) = self.stack.last_mut() {
            if let Some(dir) = frame.pending_dirs.pop_front() {
                self.descend(&dir)?;
                return Ok(true);
            }
            if let Some(frame) = self.stack.pop() {
                if !frame.path.is_empty() {
                    self.ready.push_back(WalkEntry::directory(&frame.path));
                }
            }
            return Ok(true);
        }

        if let Some(search_path) = self.search_paths.pop_front() {
            self.start_search(&search_path)?;
            return Ok(true);
        }

        if let Some(parent_path) = self.parent_paths.pop_front() {
            let entry = if self.filesystem.directory_exists(&parent_path)? {
                WalkEntry::directory(&parent_path)
            } else {
                trace!(path = %parent_path, "Ancestor of a requested path is gone");
                WalkEntry::missing_directory(&parent_path)
            };
            self.ready.push_back(entry);
            return Ok(true);
        }

        Ok(false)
    }

    fn start_search(&mut self, path: &str) -> Result<(), DbafsError> {
        if path.is_empty() {
            return self.descend(path);
        }

        match self.classify(path)? {
            Some(item) if !item.is_file => self.descend(path),
            Some(item) if self.is_eligible(&item) => {
                let entry = self.hash_file(path)?;
                self.ready.push_back(entry);
                Ok(())
            }
            _ => {
                trace!(path, "Requested path is missing");
                self.ready.push_back(WalkEntry::missing(path));
                Ok(())
            }
        }
    }

    /// Look a requested path up in its parent's listing, listing each parent once
    fn classify(&mut self, path: &str) -> Result<Option<FilesystemItem>, DbafsError> {
        let parent = paths::parent(path).to_string();
        if !self.listings.contains_key(&parent) {
            let mut by_name = HashMap::new();
            if self.filesystem.directory_exists(&parent)? {
                for item in self.filesystem.list_contents(&parent, false)? {
                    by_name.insert(paths::basename(&item.path).to_string(), item);
                }
            }
            self.listings.insert(parent.clone(), by_name);
        }

        Ok(self
            .listings
            .get(&parent)
            .and_then(|by_name| by_name.get(paths::basename(path)))
            .cloned())
    }

    fn is_eligible(&self, item: &FilesystemItem) -> bool {
        let name = paths::basename(&item.path);
        if name == PUBLIC_MARKER || name == EXCLUDE_MARKER {
            return false;
        }
        if let (Some(max), Some(size)) = (self.max_file_size, item.file_size) {
            if size > max {
                debug!(path = %item.path, size, max, "Skipping file above size limit");
                return false;
            }
        }
        true
    }

    fn descend(&mut self, path: &str) -> Result<(), DbafsError> {
        let mut pending_dirs = VecDeque::new();
        for item in self.filesystem.list_contents(path, false)? {
            if !item.is_file {
                let marker = paths::join(&item.path, EXCLUDE_MARKER);
                if self.filesystem.file_exists(&marker)? {
                    debug!(path = %item.path, "Skipping excluded directory");
                    continue;
                }
                pending_dirs.push_back(item.path);
                continue;
            }

            if self.is_eligible(&item) {
                let entry = self.hash_file(&item.path)?;
                self.ready.push_back(entry);
            }
        }

        self.stack.push(Frame {
            path: path.to_string(),
            pending_dirs,
        });
        Ok(())
    }

    fn hash_file(&self, path: &str) -> Result<WalkEntry, DbafsError> {
        let context = HashContext::new(
            self.snapshot.hashes.get(path).cloned(),
            self.snapshot.last_modified.get(path).copied(),
        );
        let outcome = self
            .hasher
            .hash_file_content(self.filesystem, path, &context)?;

        let (hash, last_modified) = match (outcome, context.fallback_hash) {
            (FileHash::Computed { hash, last_modified }, _) => (hash, last_modified),
            (FileHash::Unchanged, Some(hash)) => (hash, context.last_modified),
            (FileHash::Unchanged, None) => {
                return Err(DbafsError::Internal(format!(
                    "hash of \"{}\" reported unchanged without a known hash",
                    path
                )))
            }
        };

        Ok(WalkEntry {
            key: path.to_string(),
            state: Walked::File {
                hash,
                last_modified,
            },
        })
    }
}

impl Iterator for FilesystemWalker<'_> {
    type Item = Result<WalkEntry, DbafsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(entry) = self.ready.pop_front() {
                return Some(Ok(entry));
            }
            match self.advance() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
