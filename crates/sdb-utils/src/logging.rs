//! # Logging Utilities
//!
//! Logging infrastructure for sdb using `tracing`.
//!
//! This module provides structured logging with support for:
//! - Pretty (development) and JSON (machine-readable) output
//! - Environment variable configuration
//! - Log level filtering
//! - Optional file output
//!
//! Console output goes to **stderr**: stdout belongs to the debugging session.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sdb_utils::init_logging;
//!
//! // Keep the guard alive for as long as logs should be written
//! let _guard = init_logging().expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Log filter (e.g., `RUST_LOG=debug`, `RUST_LOG=sdb_core=trace`)
//! - `SDB_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `SDB_LOG_FILE`: Optional path to an additional log file
//!
//! A log file path that names an existing directory gets a dated file inside
//! it, e.g. `logs/2025-01-31-sdb.log`.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Level used when neither an explicit level nor `RUST_LOG` is given.
///
/// Kept at `WARN` so an interactive session is not interleaved with
/// per-syscall chatter.
pub const DEFAULT_LEVEL: Level = Level::WARN;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(format!("{s} (use 'pretty' or 'json')"))),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level
    Info,
    /// Debug level
    Debug,
    /// Trace level (every system call)
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(format!(
                "{s} (use 'error', 'warn', 'info', 'debug', or 'trace')"
            ))),
        }
    }
}

/// Keeps background log writers alive
///
/// File output is written by a worker thread; dropping the guard flushes it
/// and stops the thread. Hold it until the program exits.
#[must_use = "dropping the guard stops file logging"]
#[derive(Default)]
pub struct LoggingGuard
{
    _file: Option<WorkerGuard>,
}

/// Initialize logging from the environment
///
/// Reads `SDB_LOG_FORMAT`, `RUST_LOG` and `SDB_LOG_FILE`. An unparseable
/// `SDB_LOG_FORMAT` falls back to pretty output.
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed or the log
/// file cannot be opened.
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    let format = env::var("SDB_LOG_FORMAT")
        .ok()
        .and_then(|s| LogFormat::from_str(&s).ok())
        .unwrap_or_default();

    init_logging_internal(format, None)
}

/// Initialize logging with an explicit format
///
/// The level still comes from `RUST_LOG` (or [`DEFAULT_LEVEL`]); the format
/// overrides `SDB_LOG_FORMAT`.
///
/// ## Errors
///
/// Returns an error if logging is already initialized or file logging fails.
pub fn init_logging_with_format(format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    init_logging_internal(format, None)
}

/// Initialize logging with an explicit level and format
///
/// The explicit level wins over `RUST_LOG`. `SDB_LOG_FILE` is still honoured.
///
/// ```rust,no_run
/// use sdb_utils::{LogFormat, LogLevel, init_logging_with_level};
///
/// let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Pretty)
///     .expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if logging is already initialized or file logging fails.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    init_logging_internal(format, Some(level.into()))
}

/// Initialize file-only logging
///
/// Nothing is written to the console, so the session output stays clean even
/// at `trace` level. Parent directories are created if needed.
///
/// ## Errors
///
/// Returns an error if logging is already initialized or the file cannot be
/// created.
pub fn init_logging_to_file(
    log_file: &Path,
    level: Option<LogLevel>,
    format: LogFormat,
) -> Result<LoggingGuard, LoggingError>
{
    let log_file = resolve_log_path(log_file);
    let (layer, guard) = file_layer(&log_file, format, build_filter(level.map(Into::into)))?;

    Registry::default()
        .with(vec![layer])
        .try_init()
        .map_err(|e| LoggingError::InitializationFailed(e.to_string()))?;

    Ok(LoggingGuard { _file: Some(guard) })
}

fn init_logging_internal(format: LogFormat, explicit_level: Option<Level>) -> Result<LoggingGuard, LoggingError>
{
    let mut layers = vec![format_layer(format, io::stderr, true, build_filter(explicit_level))];
    let mut guard = LoggingGuard::default();

    if let Some(file_path) = env::var_os("SDB_LOG_FILE").map(|path| resolve_log_path(Path::new(&path))) {
        let (layer, file_guard) = file_layer(&file_path, format, build_filter(explicit_level))?;
        layers.push(layer);
        guard._file = Some(file_guard);
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::InitializationFailed(e.to_string()))?;

    Ok(guard)
}

/// Where to write logs for a user-supplied path.
///
/// A directory gets `<YYYY-MM-DD>-sdb.log` (UTC date) inside it; anything else
/// is used as given.
#[must_use]
pub fn resolve_log_path(path: &Path) -> PathBuf
{
    if path.is_dir() {
        let today = Utc::now().format("%Y-%m-%d");
        path.join(format!("{today}-sdb.log"))
    } else {
        path.to_path_buf()
    }
}

/// Filter priority: explicit level, then `RUST_LOG`, then [`DEFAULT_LEVEL`].
fn build_filter(explicit_level: Option<Level>) -> EnvFilter
{
    match explicit_level {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL.to_string())),
    }
}

fn format_layer<W>(format: LogFormat, writer: W, ansi: bool, filter: EnvFilter) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339());

    match format {
        LogFormat::Pretty => layer.with_ansi(ansi).with_filter(filter).boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

fn file_layer(log_file: &Path, format: LogFormat, filter: EnvFilter) -> Result<(BoxedLayer, WorkerGuard), LoggingError>
{
    let directory = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_file
        .file_name()
        .ok_or_else(|| LoggingError::InvalidPath(log_file.display().to_string()))?;

    std::fs::create_dir_all(directory)?;

    // The caller chooses the name, so never rotate it
    let appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    // No ANSI in files
    Ok((format_layer(format, non_blocking, false, filter), guard))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// Log file path has no file name
    #[error("Invalid log file path: {0}")]
    InvalidPath(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
