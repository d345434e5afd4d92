//! DBAFS: Database Assisted Filesystem
//!
//! Keeps a table of file and folder records in sync with the filesystem they
//! describe. Records carry a stable UUID that survives renames and moves, and a
//! content hash; folder hashes aggregate their children's, so a changed file
//! changes the hash of every ancestor.
//!
//! The entry points are [`Dbafs`] for one filesystem/table pair and
//! [`DbafsManager`] for several of them mounted under path prefixes.

pub mod config;
pub mod dbafs;
pub mod error;
pub mod filesystem;
pub mod hash;
pub mod logging;
pub mod manager;
pub mod paths;
pub mod store;
pub mod sync;
pub mod tooling;
pub mod types;

pub use dbafs::{Dbafs, DbafsBackend, DbafsOptions, MetadataProvider};
pub use error::{DbafsError, FilesystemError, FsOperation, StorageError};
pub use manager::DbafsManager;
pub use sync::ChangeSet;
pub use types::{ExtraMetadata, Features, Record, RecordKind};
