//! CLI Tooling
//!
//! Command-line interface over a workspace's configured mounts. Every command
//! returns its output as a string; the binary decides where it goes.

use crate::config::{ConfigLoader, DbafsConfig};
use crate::dbafs::Dbafs;
use crate::error::{DbafsError, StorageError};
use crate::filesystem::LocalFilesystemAdapter;
use crate::logging::LoggingConfig;
use crate::manager::DbafsManager;
use crate::store::SledDatastore;
use crate::sync::ChangeSet;
use crate::types::Record;
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// dbafs - keep a database of records in sync with the files it describes
#[derive(Parser)]
#[command(name = "dbafs")]
#[command(about = "Synchronize a record database with the filesystem it describes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Apply logging flags on top of the configured logging settings
    pub fn logging_config(&self, mut base: LoggingConfig) -> LoggingConfig {
        if let Some(level) = &self.log_level {
            base.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            base.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            base.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            base.file = Some(file.clone());
        }
        base
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize the database with the filesystem
    Sync {
        /// Paths to synchronize (default: everything)
        paths: Vec<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show what a sync would change without writing anything
    Diff {
        /// Paths to compare (default: everything)
        paths: Vec<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the record stored for a path
    Show {
        path: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List records below a path
    Ls {
        /// Directory to list (default: root)
        #[arg(default_value = "")]
        path: String,
        /// Include all descendants
        #[arg(long)]
        deep: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the path of the record with the given UUID
    Resolve {
        uuid: String,
        /// Only look in the mount at this prefix
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
}

/// Workspace-bound command executor
pub struct CliContext {
    workspace_root: PathBuf,
    config: DbafsConfig,
    db: sled::Db,
    manager: DbafsManager,
}

impl CliContext {
    /// Load configuration, open the store and mount every configured DBAFS
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, DbafsError> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };

        let store_path = config.storage.resolve_path(&workspace_root)?;
        std::fs::create_dir_all(&store_path).map_err(StorageError::Io)?;
        let db = sled::open(&store_path).map_err(StorageError::from)?;

        let mut manager = DbafsManager::new();
        for mount in &config.mounts {
            let root = workspace_root.join(&mount.root);
            let dbafs = Dbafs::new(
                Arc::new(LocalFilesystemAdapter::new(root)),
                Arc::new(SledDatastore::from_db(db.clone(), &mount.table)?),
                mount.options(&config.sync),
            )?;
            manager.register(&mount.prefix, Arc::new(dbafs))?;
        }
        info!(
            workspace = %workspace_root.display(),
            store = %store_path.display(),
            mounts = config.mounts.len(),
            "Workspace opened"
        );

        Ok(Self {
            workspace_root,
            config,
            db,
            manager,
        })
    }

    pub fn config(&self) -> &DbafsConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &PathBuf {
        &self.workspace_root
    }

    pub fn manager(&self) -> &DbafsManager {
        &self.manager
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, DbafsError> {
        match command {
            Commands::Sync { paths, format } => {
                let change_set = self.manager.sync(paths)?;
                self.db.flush().map_err(StorageError::from)?;
                format_change_set(&change_set, format, true)
            }
            Commands::Diff { paths, format } => {
                let change_set = self.manager.compute_change_set(paths)?;
                format_change_set(&change_set, format, false)
            }
            Commands::Show { path, format } => match self.manager.get_record(path)? {
                Some(record) => format_record(&record, format),
                None => Ok(format!("No record for \"{}\"", path)),
            },
            Commands::Ls { path, deep, format } => {
                let records = self.manager.get_records(path, *deep)?;
                format_records(&records, format)
            }
            Commands::Resolve { uuid, prefix } => {
                let uuid = Uuid::parse_str(uuid)
                    .map_err(|e| DbafsError::Config(format!("Invalid UUID {}: {}", uuid, e)))?;
                Ok(self
                    .manager
                    .resolve_uuid(uuid, prefix.as_deref())?
                    .unwrap_or_else(|| format!("No record with UUID {}", uuid)))
            }
            Commands::Config {
                command: ConfigCommands::Show,
            } => toml::to_string_pretty(&self.config)
                .map_err(|e| DbafsError::Internal(format!("Failed to render config: {}", e))),
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DbafsError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| DbafsError::Internal(format!("Failed to render JSON: {}", e)))
}

fn format_change_set(
    change_set: &ChangeSet,
    format: &str,
    applied: bool,
) -> Result<String, DbafsError> {
    if format == "json" {
        return to_json(&json!({
            "applied": applied,
            "change_set": change_set,
        }));
    }

    if change_set.is_empty(true) {
        return Ok("Already in sync.".to_string());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["", "Path", "Kind", "Details"]);
    for item in change_set.items_to_create() {
        table.add_row(vec![
            "+".green().to_string(),
            item.path.clone(),
            item.kind.to_string(),
            short_hash(&item.hash),
        ]);
    }
    for item in change_set.items_to_update() {
        let mut details = Vec::new();
        if let Some(new_path) = &item.new_path {
            details.push(format!("moved to {}", new_path));
        }
        if let Some(new_hash) = &item.new_hash {
            details.push(format!("hash {}", short_hash(new_hash)));
        }
        if let Some(last_modified) = item.new_last_modified {
            details.push(format!("modified {}", format_timestamp(last_modified)));
        }
        table.add_row(vec![
            "~".yellow().to_string(),
            item.existing_path.clone(),
            item.kind.to_string(),
            details.join(", "),
        ]);
    }
    for item in change_set.items_to_delete() {
        table.add_row(vec![
            "-".red().to_string(),
            item.path.clone(),
            item.kind.to_string(),
            String::new(),
        ]);
    }

    let summary = format!(
        "{} {} created, {} updated, {} deleted",
        if applied { "Synchronized:" } else { "Pending:" }.bold(),
        change_set.items_to_create().len(),
        change_set.items_to_update().len(),
        change_set.items_to_delete().len(),
    );
    Ok(format!("{}\n{}", table, summary))
}

fn format_record(record: &Record, format: &str) -> Result<String, DbafsError> {
    if format == "json" {
        return to_json(record);
    }

    let mut lines = vec![
        format!("{}", record.path.bold()),
        format!("  UUID:     {}", record.uuid),
        format!("  Kind:     {}", record.kind),
        format!("  Hash:     {}", record.hash),
    ];
    if let Some(size) = record.file_size {
        lines.push(format!("  Size:     {} bytes", size));
    }
    if let Some(last_modified) = record.last_modified {
        lines.push(format!("  Modified: {}", format_timestamp(last_modified)));
    }
    for (key, value) in &record.extra {
        lines.push(format!("  {}: {}", key, value));
    }
    Ok(lines.join("\n"))
}

fn format_records(records: &[Record], format: &str) -> Result<String, DbafsError> {
    if format == "json" {
        return to_json(&records);
    }
    if records.is_empty() {
        return Ok("No records.".to_string());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Path", "Kind", "UUID", "Hash", "Size"]);
    for record in records {
        table.add_row(vec![
            record.path.clone(),
            record.kind.to_string(),
            record.uuid.to_string(),
            short_hash(&record.hash),
            record
                .file_size
                .map(|size| size.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    Ok(table.to_string())
}

fn short_hash(hash: &str) -> String {
    hash.chars().take(12).collect()
}

fn format_timestamp(seconds: i64) -> String {
    chrono::DateTime::from_timestamp(seconds, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| seconds.to_string())
}
