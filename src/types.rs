//! Core types shared by the DBAFS components.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Open key-value metadata attached to a record by metadata providers.
///
/// Never persisted by the sync engine.
pub type ExtraMetadata = BTreeMap<String, serde_json::Value>;

/// Record type: a file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    File,
    Folder,
}

impl RecordKind {
    pub fn is_file(self) -> bool {
        matches!(self, RecordKind::File)
    }

    pub fn is_directory(self) -> bool {
        matches!(self, RecordKind::Folder)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::File => f.write_str("file"),
            RecordKind::Folder => f.write_str("folder"),
        }
    }
}

bitflags! {
    /// Capabilities a DBAFS can advertise for the records it serves
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Features: u8 {
        const LAST_MODIFIED = 0b001;
        const FILE_SIZE = 0b010;
    }
}

impl Features {
    /// Features that must hold for every DBAFS mounted below one that advertises them
    pub const TRANSITIVE: Features = Features::LAST_MODIFIED.union(Features::FILE_SIZE);

    /// Human readable name of a single flag
    pub fn name(self) -> &'static str {
        if self == Features::LAST_MODIFIED {
            "last_modified"
        } else if self == Features::FILE_SIZE {
            "file_size"
        } else {
            "combined"
        }
    }
}

/// A filesystem entry known to the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Normalized path relative to the DBAFS root, without trailing slash
    pub path: String,
    pub uuid: Uuid,
    pub kind: RecordKind,
    /// Content hash for files, aggregate child hash for folders
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<i64>,
    /// Size in bytes as reported by the filesystem; files only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: ExtraMetadata,
}

impl Record {
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    /// Return this record under a different path (used to re-attach mount prefixes)
    pub fn with_path(mut self, path: String) -> Self {
        self.path = path;
        self
    }
}
