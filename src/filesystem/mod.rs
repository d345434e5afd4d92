//! Filesystem adapters
//!
//! The sync engine never touches a concrete backing store directly; it reads
//! through [`FilesystemAdapter`]. Paths are root-relative and slash-separated.

pub mod local;
pub mod memory;

pub use local::LocalFilesystemAdapter;
pub use memory::InMemoryFilesystemAdapter;

use crate::error::FilesystemError;
use std::io::Read;

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemItem {
    pub path: String,
    pub is_file: bool,
    pub file_size: Option<u64>,
    pub last_modified: Option<i64>,
}

impl FilesystemItem {
    pub fn file(path: impl Into<String>, file_size: u64, last_modified: Option<i64>) -> Self {
        Self {
            path: path.into(),
            is_file: true,
            file_size: Some(file_size),
            last_modified,
        }
    }

    pub fn directory(path: impl Into<String>, last_modified: Option<i64>) -> Self {
        Self {
            path: path.into(),
            is_file: false,
            file_size: None,
            last_modified,
        }
    }
}

/// Read access to the filesystem a DBAFS describes
pub trait FilesystemAdapter: Send + Sync {
    fn file_exists(&self, path: &str) -> Result<bool, FilesystemError>;

    fn directory_exists(&self, path: &str) -> Result<bool, FilesystemError>;

    /// List the contents of a directory, sorted by path.
    ///
    /// With `deep` the listing includes all descendants.
    fn list_contents(&self, path: &str, deep: bool) -> Result<Vec<FilesystemItem>, FilesystemError>;

    fn read(&self, path: &str) -> Result<Box<dyn Read + '_>, FilesystemError>;

    /// Last modification time in seconds since the epoch, if the backend tracks it
    fn last_modified(&self, path: &str) -> Result<Option<i64>, FilesystemError>;

    fn file_size(&self, path: &str) -> Result<Option<u64>, FilesystemError>;
}
