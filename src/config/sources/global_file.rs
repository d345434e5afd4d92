//! Global config file: `$XDG_CONFIG_HOME/dbafs/config.toml`, optional.

use crate::config::xdg;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::PathBuf;

/// Location of the global config file, if a config home can be determined
pub fn path() -> Option<PathBuf> {
    xdg::config_home()
        .ok()
        .map(|home| home.join("dbafs").join("config.toml"))
}

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(match path() {
        Some(path) => {
            builder.add_source(File::from(path).format(FileFormat::Toml).required(false))
        }
        None => builder,
    })
}
