//! ConfigLoader facade delegating to the merge service.

use super::merge::service::MergeService;
use super::DbafsConfig;
use crate::error::DbafsError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the workspace at `workspace_root` from files and environment.
    pub fn load(workspace_root: &Path) -> Result<DbafsConfig, DbafsError> {
        let config = MergeService::load(workspace_root)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file, with the environment on top.
    pub fn load_from_file(path: &Path) -> Result<DbafsConfig, DbafsError> {
        let config = MergeService::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}
