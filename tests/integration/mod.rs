//! Integration tests for the DBAFS sync engine

mod cli_workspace;
mod local_persistence;
mod manager_routing;
mod move_detection;
mod partial_sync;
mod support;
mod sync_scenarios;
