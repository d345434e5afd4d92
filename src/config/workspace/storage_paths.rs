//! StorageConfig and resolve_path for the record store.

use crate::config::xdg;
use crate::error::DbafsError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_STORE_PATH: &str = ".dbafs/store";

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the sled database (relative to workspace root)
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

impl StorageConfig {
    /// Resolve the store location; the default lives in the workspace's XDG data directory.
    pub fn resolve_path(&self, workspace_root: &Path) -> Result<PathBuf, DbafsError> {
        if self.store_path == Path::new(DEFAULT_STORE_PATH) {
            Ok(xdg::workspace_data_dir(workspace_root)?.join("store"))
        } else {
            Ok(workspace_root.join(&self.store_path))
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}
