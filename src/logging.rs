//! Run logging: a timestamped log file plus a terminal stream.
//!
//! Every event at or above the minimum level goes to the file. Only events
//! emitted on the [`CONSOLE`] target (per-project outcomes, run banners) are
//! echoed to stdout. The returned [`LoggingGuard`] owns the file writer and
//! flushes it when dropped, so the binary keeps it alive for the whole run.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use std::fs::{create_dir_all, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{EnvFilter, LevelFilter, Targets};
use tracing_subscriber::prelude::*;

/// Target for events that are also shown on the terminal.
pub const CONSOLE: &str = "dep_updater::console";

/// Options for [`init`].
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Minimum level: `debug`, `info` or `error` (any tracing level is accepted).
    pub level: String,
    /// Directory receiving the run log file.
    pub log_dir: PathBuf,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("."),
        }
    }
}

/// Keeps the file sink alive; dropping it flushes pending lines.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    log_file_path: PathBuf,
}

impl LoggingGuard {
    pub fn log_file_path(&self) -> &Path {
        &self.log_file_path
    }
}

/// File name of the log for a run started at `started`.
pub fn log_file_name(started: DateTime<Local>) -> String {
    format!("updater_{}.log", started.format("%Y%m%d%H%M%S"))
}

/// Parse a minimum level name.
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    LevelFilter::from_str(level.trim())
        .map_err(|_| anyhow!("invalid log level '{}', expected debug, info or error", level))
}

/// Install the global subscriber for this process.
///
/// `RUST_LOG`, when set, replaces the file filter.
pub fn init(options: &LoggingOptions) -> Result<LoggingGuard> {
    let level = parse_level(&options.level)?;

    create_dir_all(&options.log_dir).with_context(|| {
        format!(
            "failed to create log directory {}",
            options.log_dir.display()
        )
    })?;
    let log_file_path = options.log_dir.join(log_file_name(Local::now()));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)
        .with_context(|| format!("failed to open log file {}", log_file_path.display()))?;
    let (writer, file_guard) = tracing_appender::non_blocking(file);

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_filter(file_filter);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_filter(Targets::new().with_target(CONSOLE, level));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("logging already initialized")?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        log_file_path,
    })
}
