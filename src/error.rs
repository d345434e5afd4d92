//! Error types
//!
//! Absence is never an error: lookups return `Ok(None)`. The variants below cover
//! failed I/O, broken invariants and bad configuration.

use std::fmt;
use std::io;
use thiserror::Error;

/// Filesystem operation that was being attempted when an adapter call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOperation {
    Read,
    List,
    Metadata,
    Write,
}

impl fmt::Display for FsOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FsOperation::Read => "read",
            FsOperation::List => "list",
            FsOperation::Metadata => "retrieve metadata of",
            FsOperation::Write => "write",
        };
        f.write_str(name)
    }
}

/// A failed filesystem adapter call, carrying the operation and the offending path
#[derive(Debug, Error)]
#[error("Unable to {operation} \"{path}\": {source}")]
pub struct FilesystemError {
    pub operation: FsOperation,
    pub path: String,
    #[source]
    pub source: io::Error,
}

impl FilesystemError {
    pub fn new(operation: FsOperation, path: impl Into<String>, source: io::Error) -> Self {
        Self {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Datastore errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Error returned by every public DBAFS operation
#[derive(Debug, Error)]
pub enum DbafsError {
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid path \"{path}\": {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("No parent entry found for non-root resource \"{0}\"")]
    MissingParent(String),

    #[error("Hash algorithm \"{0}\" is not supported")]
    UnsupportedHashAlgorithm(String),

    #[error(
        "The transitive feature \"{feature}\" is supported by the DBAFS at \"{prefix}\" but not by the nested DBAFS at \"{child_prefix}\""
    )]
    FeatureConflict {
        feature: String,
        prefix: String,
        child_prefix: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for DbafsError {
    fn from(err: config::ConfigError) -> Self {
        DbafsError::Config(err.to_string())
    }
}

impl DbafsError {
    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        DbafsError::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
