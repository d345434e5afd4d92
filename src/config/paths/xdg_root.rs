//! XDG Base Directory utilities for workspace data management.

use crate::error::DbafsError;
use std::path::{Component, Path, PathBuf};

/// Get XDG data home directory
///
/// Returns `$XDG_DATA_HOME` if set, otherwise defaults to `$HOME/.local/share`
pub fn data_home() -> Option<PathBuf> {
    if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        return Some(PathBuf::from(xdg_data_home));
    }

    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local").join("share"))
}

/// Get XDG config home directory
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise defaults to `$HOME/.config`
pub fn config_home() -> Result<PathBuf, DbafsError> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg_config_home));
    }

    let home = std::env::var("HOME").map_err(|_| {
        DbafsError::Config(
            "Could not determine XDG config home directory (HOME not set)".to_string(),
        )
    })?;

    Ok(PathBuf::from(home).join(".config"))
}

/// Data directory of one workspace: `$XDG_DATA_HOME/dbafs/<canonical workspace path>/`
///
/// `/home/user/site` maps to `$XDG_DATA_HOME/dbafs/home/user/site/`, so a
/// workspace never needs a data directory of its own.
pub fn workspace_data_dir(workspace_root: &Path) -> Result<PathBuf, DbafsError> {
    let data_home = data_home().ok_or_else(|| {
        DbafsError::Config("Could not determine XDG data home directory (HOME not set)".to_string())
    })?;

    let canonical = workspace_root.canonicalize().map_err(|e| {
        DbafsError::Config(format!(
            "Failed to canonicalize workspace path {}: {}",
            workspace_root.display(),
            e
        ))
    })?;

    Ok(canonical
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name),
            _ => None,
        })
        .fold(data_home.join("dbafs"), |dir, name| dir.join(name)))
}
