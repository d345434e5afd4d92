//! Configuration
//!
//! Layered configuration for the `dbafs` tool: built-in defaults, the global
//! file, the workspace file and `DBAFS_*` environment variables, in increasing
//! order of precedence. See [`ConfigLoader`].

mod facade;
pub mod merge;
pub mod paths;
pub mod sources;
pub mod workspace;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use workspace::storage_paths::StorageConfig;

use crate::dbafs::DbafsOptions;
use crate::error::DbafsError;
use crate::hash::HashAlgorithm;
use crate::logging::LoggingConfig;
use crate::sync::DEFAULT_BULK_INSERT_SIZE;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Name of the workspace configuration file
pub const WORKSPACE_CONFIG_FILE: &str = "dbafs.toml";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbafsConfig {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Mounted DBAFS instances; a single root mount by default
    #[serde(default = "default_mounts")]
    pub mounts: Vec<MountConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for DbafsConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            storage: StorageConfig::default(),
            mounts: default_mounts(),
            logging: LoggingConfig::default(),
        }
    }
}

impl DbafsConfig {
    /// Reject values that would only fail once a sync runs
    pub fn validate(&self) -> Result<(), DbafsError> {
        self.sync.hash_algorithm.parse::<HashAlgorithm>()?;
        if self.sync.bulk_insert_size == 0 {
            return Err(DbafsError::Config(
                "sync.bulk_insert_size must be greater than zero".to_string(),
            ));
        }

        let mut prefixes = HashSet::new();
        let mut tables = HashSet::new();
        for mount in &self.mounts {
            let prefix = crate::paths::canonicalize(&mount.prefix)?;
            if !prefixes.insert(prefix.clone()) {
                return Err(DbafsError::Config(format!(
                    "Mount prefix \"{}\" is configured more than once",
                    prefix
                )));
            }
            if !tables.insert((mount.table.as_str(), mount.database_path_prefix.as_str())) {
                return Err(DbafsError::Config(format!(
                    "Mount \"{}\" shares table \"{}\" and path prefix with another mount",
                    prefix, mount.table
                )));
            }
        }
        Ok(())
    }
}

/// Settings shared by every mount
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// blake3, sha256 or sha512
    #[serde(default = "default_hash_algorithm")]
    pub hash_algorithm: String,

    /// Rows per bulk insert
    #[serde(default = "default_bulk_insert_size")]
    pub bulk_insert_size: usize,

    /// Largest file to synchronize in bytes; 0 disables the ceiling
    #[serde(default)]
    pub max_file_size: u64,

    /// Track modification times and skip hashing unchanged files
    #[serde(default = "default_true")]
    pub use_last_modified: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: default_hash_algorithm(),
            bulk_insert_size: default_bulk_insert_size(),
            max_file_size: 0,
            use_last_modified: default_true(),
        }
    }
}

/// One DBAFS instance: a local directory tracked in one table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountConfig {
    /// Virtual path prefix this mount is served under
    #[serde(default)]
    pub prefix: String,

    /// Directory to synchronize, relative to the workspace root
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Table (sled tree namespace) holding the records
    #[serde(default = "default_table")]
    pub table: String,

    /// Prefix under which paths are stored in the table
    #[serde(default)]
    pub database_path_prefix: String,

    #[serde(default)]
    pub use_last_modified: Option<bool>,

    #[serde(default)]
    pub max_file_size: Option<u64>,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            root: default_root(),
            table: default_table(),
            database_path_prefix: String::new(),
            use_last_modified: None,
            max_file_size: None,
        }
    }
}

impl MountConfig {
    /// Options for this mount, with its overrides applied on top of `sync`
    pub fn options(&self, sync: &SyncConfig) -> DbafsOptions {
        let max_file_size = self.max_file_size.unwrap_or(sync.max_file_size);
        DbafsOptions {
            hash_algorithm: sync.hash_algorithm.clone(),
            bulk_insert_size: sync.bulk_insert_size,
            max_file_size: (max_file_size > 0).then_some(max_file_size),
            use_last_modified: self.use_last_modified.unwrap_or(sync.use_last_modified),
            database_path_prefix: self.database_path_prefix.clone(),
        }
    }
}

fn default_mounts() -> Vec<MountConfig> {
    vec![MountConfig::default()]
}

fn default_hash_algorithm() -> String {
    "blake3".to_string()
}

fn default_bulk_insert_size() -> usize {
    DEFAULT_BULK_INSERT_SIZE
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_table() -> String {
    "files".to_string()
}

fn default_true() -> bool {
    true
}
