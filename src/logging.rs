//! Logging System
//!
//! Structured logging built on `tracing`. Level, format and destination come
//! from [`LoggingConfig`], each overridable through `DBAFS_LOG*` environment
//! variables.

use crate::error::DbafsError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Resolve the log file path with precedence: CLI, DBAFS_LOG_FILE env, config file, default.
///
/// The default lives in the platform state directory, optionally below a
/// workspace-scoped path segment.
pub fn resolve_log_file_path(
    cli_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
    workspace: Option<&Path>,
) -> Result<PathBuf, DbafsError> {
    let env_file = std::env::var("DBAFS_LOG_FILE").ok().map(PathBuf::from);
    [cli_file, env_file, config_file]
        .into_iter()
        .flatten()
        .find(|p| !p.as_os_str().is_empty())
        .map(Ok)
        .unwrap_or_else(|| default_log_file_path(workspace))
}

fn default_log_file_path(workspace: Option<&Path>) -> Result<PathBuf, DbafsError> {
    let project_dirs = directories::ProjectDirs::from("", "dbafs", "dbafs").ok_or_else(|| {
        DbafsError::Config("Could not determine platform state directory for log file".to_string())
    })?;
    let mut dir = project_dirs
        .state_dir()
        .ok_or_else(|| {
            DbafsError::Config("Platform state directory not available for log file".to_string())
        })?
        .to_path_buf();

    if let Some(ws) = workspace {
        let canonical = ws.canonicalize().map_err(|e| {
            DbafsError::Config(format!("Failed to canonicalize workspace path: {}", e))
        })?;
        for component in canonical.components() {
            if let Component::Normal(name) = component {
                dir = dir.join(name);
            }
        }
    }
    Ok(dir.join("dbafs.log"))
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file, file+stderr, both
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output includes file; None means use runtime default
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Enable colored output (text format only, stdout/stderr only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels, e.g. `dbafs::sync = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "file".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Initialize the global subscriber
///
/// Priority order (highest to lowest):
/// 1. Environment variables (DBAFS_LOG, DBAFS_LOG_FORMAT, DBAFS_LOG_OUTPUT, DBAFS_LOG_FILE)
/// 2. Configuration
/// 3. Defaults
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), DbafsError> {
    if config.is_some_and(|c| !c.enabled) {
        Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .try_init()
            .map_err(|e| DbafsError::Config(format!("Failed to install logger: {}", e)))?;
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let output = determine_output(config)?;
    let writer = output.make_writer(config)?;
    let use_color = output.is_terminal_only() && config.map(|c| c.color).unwrap_or(true);

    let base_subscriber = Registry::default().with(filter);
    let installed = if format == LogFormat::Json {
        base_subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init()
    } else {
        base_subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(use_color)
                    .with_writer(writer),
            )
            .try_init()
    };
    installed.map_err(|e| DbafsError::Config(format!("Failed to install logger: {}", e)))
}

/// Build environment filter from config or environment variables
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, DbafsError> {
    if let Ok(filter) = EnvFilter::try_from_env("DBAFS_LOG") {
        return Ok(filter);
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("info");
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut directives: Vec<String> = config
        .map(|c| {
            c.modules
                .iter()
                .map(|(module, module_level)| format!("{}={}", module, module_level))
                .collect()
        })
        .unwrap_or_default();

    // DBAFS_LOG_MODULES="dbafs::sync=debug,dbafs::store=trace"
    if let Ok(modules) = std::env::var("DBAFS_LOG_MODULES") {
        directives.extend(
            modules
                .split(',')
                .filter_map(|spec| spec.split_once('='))
                .map(|(module, module_level)| {
                    format!("{}={}", module.trim(), module_level.trim())
                }),
        );
    }

    let mut filter = EnvFilter::new(level);
    for directive in directives {
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| DbafsError::Config(format!("Invalid log directive {}: {}", directive, e)))?,
        );
    }
    Ok(filter)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Json,
    Text,
}

/// Determine output format from environment or config
fn determine_format(config: Option<&LoggingConfig>) -> Result<LogFormat, DbafsError> {
    let from_env = std::env::var("DBAFS_LOG_FORMAT")
        .ok()
        .filter(|f| f == "json" || f == "text");
    let format = from_env
        .as_deref()
        .or_else(|| config.map(|c| c.format.as_str()))
        .unwrap_or("text");

    match format {
        "json" => Ok(LogFormat::Json),
        "text" => Ok(LogFormat::Text),
        other => Err(DbafsError::Config(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            other
        ))),
    }
}

/// Output destinations
#[derive(Debug)]
struct OutputDestinations {
    stdout: bool,
    stderr: bool,
    file: bool,
}

impl OutputDestinations {
    fn is_terminal_only(&self) -> bool {
        !self.file
    }

    fn make_writer(&self, config: Option<&LoggingConfig>) -> Result<BoxMakeWriter, DbafsError> {
        if self.file {
            let file = open_log_file(config)?;
            return Ok(if self.stderr {
                BoxMakeWriter::new(file.and(std::io::stderr))
            } else {
                BoxMakeWriter::new(file)
            });
        }
        Ok(match (self.stdout, self.stderr) {
            (true, true) => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
            (false, true) => BoxMakeWriter::new(std::io::stderr),
            _ => BoxMakeWriter::new(std::io::stdout),
        })
    }
}

fn open_log_file(config: Option<&LoggingConfig>) -> Result<std::fs::File, DbafsError> {
    let log_file = resolve_log_file_path(None, config.and_then(|c| c.file.clone()), None)?;
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| DbafsError::Config(format!("Failed to create log directory: {}", e)))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .map_err(|e| DbafsError::Config(format!("Failed to open log file {:?}: {}", log_file, e)))
}

/// Determine output destinations from environment or config
fn determine_output(config: Option<&LoggingConfig>) -> Result<OutputDestinations, DbafsError> {
    if let Ok(output) = std::env::var("DBAFS_LOG_OUTPUT") {
        return parse_output_destinations(&output);
    }
    parse_output_destinations(config.map(|c| c.output.as_str()).unwrap_or("file"))
}

fn parse_output_destinations(output: &str) -> Result<OutputDestinations, DbafsError> {
    let (stdout, stderr, file) = match output {
        "stdout" => (true, false, false),
        "stderr" => (false, true, false),
        "file" => (false, false, true),
        "file+stderr" => (false, true, true),
        "both" => (true, true, false),
        _ => {
            return Err(DbafsError::Config(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr', 'file', 'file+stderr', or 'both')",
                output
            )))
        }
    };
    Ok(OutputDestinations {
        stdout,
        stderr,
        file,
    })
}
