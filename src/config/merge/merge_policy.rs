//! Built-in defaults, the lowest layer of every merge.

use crate::sync::DEFAULT_BULK_INSERT_SIZE;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Start a builder carrying the scalar defaults.
///
/// Tables of tables (`mounts`) are defaulted by serde when no source sets them.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("sync.hash_algorithm", "blake3")?
        .set_default("sync.bulk_insert_size", DEFAULT_BULK_INSERT_SIZE as i64)?
        .set_default("sync.max_file_size", 0i64)?
        .set_default("sync.use_last_modified", true)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "file")
}
