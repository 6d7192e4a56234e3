//! Logging
//!
//! `tracing` subscriber setup. Precedence, highest first: CLI flags (folded
//! into the config by the binary), `THINKBLOCKS_LOG*` environment variables,
//! configuration file, defaults.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub const ENV_FILTER: &str = "THINKBLOCKS_LOG";
pub const ENV_FORMAT: &str = "THINKBLOCKS_LOG_FORMAT";
pub const ENV_OUTPUT: &str = "THINKBLOCKS_LOG_OUTPUT";
pub const ENV_MODULES: &str = "THINKBLOCKS_LOG_MODULES";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ApiError::Configuration(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
}

impl FromStr for LogOutput {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            "file" => Ok(LogOutput::File),
            other => Err(ApiError::Configuration(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr' or 'file')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error, off
    pub level: String,
    pub format: LogFormat,
    /// Lesson output goes to stdout, so logs default to stderr.
    pub output: LogOutput,
    pub file: PathBuf,
    /// Text format on a terminal only.
    pub color: bool,
    /// Per-module levels, e.g. `thinkblocks::generation = "debug"`.
    pub modules: BTreeMap<String, String>,
}

fn default_log_file() -> PathBuf {
    PathBuf::from(".thinkblocks/thinkblocks.log")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            output: LogOutput::Stderr,
            file: default_log_file(),
            color: true,
            modules: BTreeMap::new(),
        }
    }
}

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !LEVELS.contains(&self.level.to_ascii_lowercase().as_str()) {
            return Err(format!("Invalid log level: {}", self.level));
        }
        for (module, level) in &self.modules {
            if !LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
                return Err(format!("Invalid log level '{}' for module {}", level, module));
            }
        }
        if self.output == LogOutput::File && self.file.as_os_str().is_empty() {
            return Err("Log output 'file' requires a file path".to_string());
        }
        Ok(())
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), ApiError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);

    let filter = build_env_filter(config)?;
    let format = match std::env::var(ENV_FORMAT) {
        Ok(value) => value.parse()?,
        Err(_) => config.format,
    };
    let output = match std::env::var(ENV_OUTPUT) {
        Ok(value) => value.parse()?,
        Err(_) => config.output,
    };

    let (writer, ansi) = match output {
        LogOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), config.color),
        LogOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), config.color),
        LogOutput::File => (BoxMakeWriter::new(Arc::new(open_log_file(&config.file)?)), false),
    };

    let registry = Registry::default().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .try_init(),
    };
    installed.map_err(|e| ApiError::Configuration(format!("Failed to install logger: {}", e)))
}

fn open_log_file(path: &Path) -> Result<std::fs::File, ApiError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            ApiError::Configuration(format!("Failed to create log directory: {}", e))
        })?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            ApiError::Configuration(format!("Failed to open log file {}: {}", path.display(), e))
        })
}

/// `THINKBLOCKS_LOG` wins outright; otherwise level plus module directives.
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, ApiError> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_FILTER) {
        return Ok(filter);
    }

    let level = config.level.to_ascii_lowercase();
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut directives: Vec<String> = config
        .modules
        .iter()
        .map(|(module, module_level)| format!("{}={}", module, module_level))
        .collect();
    if let Ok(modules) = std::env::var(ENV_MODULES) {
        directives.extend(parse_module_directives(&modules));
    }

    let mut filter = EnvFilter::new(level);
    for directive in directives {
        filter = filter.add_directive(directive.parse().map_err(|e| {
            ApiError::Configuration(format!("Invalid log directive '{}': {}", directive, e))
        })?);
    }
    Ok(filter)
}

/// `a=debug, b = warn` into directives; malformed entries are skipped.
fn parse_module_directives(directives: &str) -> Vec<String> {
    directives.split(',')
        .filter_map(|part| {
            let (module, level) = part.split_once('=')?;
            let (module, level) = (module.trim(), level.trim());
            (!module.is_empty() && !level.is_empty()).then(|| format!("{}={}", module, level))
        })
        .collect()
}
