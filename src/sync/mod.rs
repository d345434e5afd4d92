//! Synchronization engine
//!
//! One pass reads both sides, diffs them and (unless dry-running) writes the
//! difference back in a single transaction:
//!
//! 1. [`SyncScope`] normalizes the requested paths.
//! 2. [`DatabaseEntryReader`] loads the relevant records.
//! 3. [`FilesystemWalker`] visits the filesystem children-first.
//! 4. [`ChangeSetComputer`] diffs the two and detects moves.
//! 5. [`ChangeSetApplier`] persists the resulting [`ChangeSet`].

pub mod applier;
pub mod change_set;
pub mod computer;
pub mod reader;
pub mod scope;
pub mod walker;

pub use applier::{ChangeSetApplier, DEFAULT_BULK_INSERT_SIZE};
pub use change_set::{ChangeSet, ItemToCreate, ItemToDelete, ItemToUpdate};
pub use computer::{aggregate_directory_hash, ChangeSetComputer};
pub use reader::{diff_key, split_diff_key, DatabaseEntryReader, DatabaseSnapshot};
pub use scope::SyncScope;
pub use walker::{FilesystemWalker, WalkEntry, Walked, EXCLUDE_MARKER, PUBLIC_MARKER};
