//! In-memory adapter with a logical clock for modification times.

use super::{FilesystemAdapter, FilesystemItem};
use crate::error::{FilesystemError, FsOperation};
use crate::paths;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read};

#[derive(Debug, Clone)]
enum Node {
    File { content: Vec<u8>, last_modified: i64 },
    Directory,
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    clock: i64,
}

impl State {
    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    fn ensure_parents(&mut self, path: &str) {
        for ancestor in paths::ancestors(path) {
            self.nodes
                .entry(ancestor.to_string())
                .or_insert(Node::Directory);
        }
    }

    fn descendants(&self, path: &str) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|p| p.as_str() != path && paths::is_base_path(path, p))
            .cloned()
            .collect()
    }
}

/// Filesystem kept entirely in memory
///
/// Every write advances a logical clock which is reported as the file's
/// modification time, so content changes always change `last_modified`.
#[derive(Debug, Default)]
pub struct InMemoryFilesystemAdapter {
    state: RwLock<State>,
}

fn not_found(operation: FsOperation, path: &str) -> FilesystemError {
    FilesystemError::new(
        operation,
        path,
        io::Error::new(io::ErrorKind::NotFound, "no such file or directory"),
    )
}

impl InMemoryFilesystemAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a file, creating missing parent directories
    pub fn write(&self, path: &str, content: impl AsRef<[u8]>) {
        let mut state = self.state.write();
        let last_modified = state.tick();
        state.ensure_parents(path);
        state.nodes.insert(
            path.to_string(),
            Node::File {
                content: content.as_ref().to_vec(),
                last_modified,
            },
        );
    }

    /// Replace a file's content without touching its modification time
    pub fn write_preserving_mtime(&self, path: &str, content: impl AsRef<[u8]>) {
        let mut state = self.state.write();
        if let Some(Node::File { content: existing, .. }) = state.nodes.get_mut(path) {
            *existing = content.as_ref().to_vec();
        }
    }

    /// Bump a file's modification time
    pub fn touch(&self, path: &str) {
        let mut state = self.state.write();
        let now = state.tick();
        if let Some(Node::File { last_modified, .. }) = state.nodes.get_mut(path) {
            *last_modified = now;
        }
    }

    pub fn create_directory(&self, path: &str) {
        let mut state = self.state.write();
        state.ensure_parents(path);
        state.nodes.insert(path.to_string(), Node::Directory);
    }

    /// Delete a file or a directory including its contents
    pub fn delete(&self, path: &str) {
        let mut state = self.state.write();
        for descendant in state.descendants(path) {
            state.nodes.remove(&descendant);
        }
        state.nodes.remove(path);
    }

    /// Move a file or a directory including its contents
    pub fn rename(&self, from: &str, to: &str) {
        let mut state = self.state.write();
        let mut moved: Vec<(String, Node)> = Vec::new();
        for descendant in state.descendants(from) {
            if let Some(node) = state.nodes.remove(&descendant) {
                let relative = paths::make_relative(&descendant, from).unwrap_or_default();
                moved.push((paths::join(to, relative), node));
            }
        }
        if let Some(node) = state.nodes.remove(from) {
            moved.push((to.to_string(), node));
        }
        state.ensure_parents(to);
        state.nodes.extend(moved);
    }
}

impl FilesystemAdapter for InMemoryFilesystemAdapter {
    fn file_exists(&self, path: &str) -> Result<bool, FilesystemError> {
        Ok(matches!(self.state.read().nodes.get(path), Some(Node::File { .. })))
    }

    fn directory_exists(&self, path: &str) -> Result<bool, FilesystemError> {
        if path.is_empty() {
            return Ok(true);
        }
        Ok(matches!(self.state.read().nodes.get(path), Some(Node::Directory)))
    }

    fn list_contents(&self, path: &str, deep: bool) -> Result<Vec<FilesystemItem>, FilesystemError> {
        if !self.directory_exists(path)? {
            return Err(not_found(FsOperation::List, path));
        }
        let state = self.state.read();
        let items = state
            .nodes
            .iter()
            .filter(|(p, _)| {
                if deep {
                    p.as_str() != path && paths::is_base_path(path, p)
                } else {
                    paths::is_direct_child(path, p)
                }
            })
            .map(|(p, node)| match node {
                Node::File {
                    content,
                    last_modified,
                } => FilesystemItem::file(p.clone(), content.len() as u64, Some(*last_modified)),
                Node::Directory => FilesystemItem::directory(p.clone(), None),
            })
            .collect();
        Ok(items)
    }

    fn read(&self, path: &str) -> Result<Box<dyn Read + '_>, FilesystemError> {
        match self.state.read().nodes.get(path) {
            Some(Node::File { content, .. }) => Ok(Box::new(Cursor::new(content.clone()))),
            _ => Err(not_found(FsOperation::Read, path)),
        }
    }

    fn last_modified(&self, path: &str) -> Result<Option<i64>, FilesystemError> {
        match self.state.read().nodes.get(path) {
            Some(Node::File { last_modified, .. }) => Ok(Some(*last_modified)),
            Some(Node::Directory) => Ok(None),
            None => Err(not_found(FsOperation::Metadata, path)),
        }
    }

    fn file_size(&self, path: &str) -> Result<Option<u64>, FilesystemError> {
        match self.state.read().nodes.get(path) {
            Some(Node::File { content, .. }) => Ok(Some(content.len() as u64)),
            Some(Node::Directory) => Ok(None),
            None => Err(not_found(FsOperation::Metadata, path)),
        }
    }
}
