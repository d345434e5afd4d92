//! Tooling & Integration Layer
//!
//! Command-line front-end for synchronizing a workspace.

pub mod cli;

pub use cli::{Cli, CliContext, Commands, ConfigCommands};
