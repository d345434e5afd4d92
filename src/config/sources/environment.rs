//! Environment variable source: DBAFS_* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "DBAFS";

/// Add environment variable overlay to builder.
/// `DBAFS_SYNC__HASH_ALGORITHM=sha256` sets `sync.hash_algorithm`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    ))
}
