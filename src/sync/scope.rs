//! Sync scope normalization.

use crate::error::DbafsError;
use crate::paths;
use tracing::debug;

/// Normalized search scope of one sync pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncScope {
    /// Paths whose subtrees are fully traversed, sorted; never nested in each other
    pub search_paths: Vec<String>,
    /// Ancestor directories of the search paths not covered by any of them, deepest first
    pub parent_paths: Vec<String>,
}

impl SyncScope {
    /// Scope covering the whole tree
    pub fn full() -> Self {
        Self {
            search_paths: vec![String::new()],
            parent_paths: Vec::new(),
        }
    }

    /// Normalize requested paths; no paths means the whole tree.
    ///
    /// Absolute paths and paths escaping the root are rejected.
    pub fn normalize<S: AsRef<str>>(requested: &[S]) -> Result<Self, DbafsError> {
        if requested.is_empty() {
            return Ok(Self::full());
        }

        let mut canonical = requested
            .iter()
            .map(|p| paths::canonicalize(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        canonical.sort();
        canonical.dedup();

        // Sorted order puts every path right after its ancestors, so a path is
        // redundant exactly when an already accepted search path covers it.
        let mut search_paths: Vec<String> = Vec::new();
        for path in canonical {
            if path.is_empty() {
                debug!("Root requested, synchronizing the whole tree");
                return Ok(Self::full());
            }
            if search_paths.iter().any(|base| paths::is_base_path(base, &path)) {
                continue;
            }
            search_paths.push(path);
        }

        let mut parent_paths: Vec<String> = search_paths
            .iter()
            .flat_map(|path| paths::ancestors(path))
            .filter(|ancestor| {
                !search_paths
                    .iter()
                    .any(|base| paths::is_base_path(base, ancestor))
            })
            .map(str::to_string)
            .collect();
        parent_paths.sort_by(|a, b| b.cmp(a));
        parent_paths.dedup();

        Ok(Self {
            search_paths,
            parent_paths,
        })
    }

    /// Whether this pass covers less than the whole tree
    pub fn is_partial(&self) -> bool {
        !(self.search_paths.len() == 1 && self.search_paths[0].is_empty())
    }

    /// Whether `path` (no trailing slash) is covered by a search path
    pub fn covers(&self, path: &str) -> bool {
        self.search_paths
            .iter()
            .any(|base| paths::is_base_path(base, path))
    }

    /// Whether `path` (no trailing slash) is one of the context-only ancestor directories
    pub fn is_parent_path(&self, path: &str) -> bool {
        self.parent_paths.iter().any(|p| p == path)
    }
}
