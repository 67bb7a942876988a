//! Logging infrastructure for flagsync
//!
//! Provides unified logging setup using the tracing ecosystem.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::{paths, FlagsyncError, Result};

/// Environment variable overriding the log filter
pub const LOG_ENV_VAR: &str = "FLAGSYNC_LOG";

/// Log file name under the log dir when no path is given
pub const DEFAULT_LOG_FILE: &str = "flagsync.log";

/// Log output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Log to stderr (for the CLI)
    Stderr,
    /// Log to file (for long-running embedding hosts)
    File,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output destination
    pub output: LogOutput,
    /// Log level filter (e.g., "info", "flagsync_core=debug")
    pub filter: String,
    /// Include span events (enter/exit)
    pub span_events: bool,
    /// Include file/line in logs
    pub file_line: bool,
    /// Log file for `LogOutput::File` (defaults to `flagsync.log` in the log dir)
    pub file_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "info".into(),
            span_events: false,
            file_line: false,
            file_path: None,
        }
    }
}

impl LogConfig {
    /// Create config for the CLI (stderr, stdout carries published views)
    pub fn cli() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: std::env::var(LOG_ENV_VAR).unwrap_or_else(|_| "info".into()),
            span_events: false,
            file_line: false,
            file_path: None,
        }
    }

    /// Create config for a long-running host (file logging)
    pub fn daemon() -> Self {
        Self {
            output: LogOutput::File,
            filter: std::env::var(LOG_ENV_VAR).unwrap_or_else(|_| "info".into()),
            span_events: true,
            file_line: true,
            file_path: None,
        }
    }

    /// Create config for development (verbose stderr)
    pub fn development() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "debug".into(),
            span_events: true,
            file_line: true,
            file_path: None,
        }
    }

    /// Write to `path` instead of the default log file
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = LogOutput::File;
        self.file_path = Some(path.into());
        self
    }

    pub fn log_file(&self) -> PathBuf {
        self.file_path
            .clone()
            .unwrap_or_else(|| paths::log_dir().join(DEFAULT_LOG_FILE))
    }

    /// Raise the filter to debug unless the environment pins a filter
    pub fn with_debug(mut self, debug: bool) -> Self {
        if debug && std::env::var(LOG_ENV_VAR).is_err() {
            self.filter = "debug".into();
        }
        self
    }
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| FlagsyncError::config(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    let fmt_layer = if config.span_events {
        fmt_layer.with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    } else {
        fmt_layer
    };

    let fmt_layer = if config.file_line {
        fmt_layer.with_file(true).with_line_number(true)
    } else {
        fmt_layer.with_file(false).with_line_number(false)
    };

    match config.output {
        LogOutput::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| FlagsyncError::internal(format!("Failed to init logging: {}", e)))?;
        }
        LogOutput::File => {
            let file = open_log_file(&config.log_file())?;
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(file).with_ansi(false))
                .try_init()
                .map_err(|e| FlagsyncError::internal(format!("Failed to init logging: {}", e)))?;
        }
    }

    Ok(())
}

/// Open a log file for appending, creating its directory
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent() {
        paths::ensure_dir(dir).map_err(|e| FlagsyncError::FileWrite {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }

    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| FlagsyncError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })
}
