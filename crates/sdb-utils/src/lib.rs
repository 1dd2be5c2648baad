//! # sdb Utilities
//!
//! Shared logging setup for the sdb workspace, built on `tracing`.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{
    init_logging, init_logging_to_file, init_logging_with_format, init_logging_with_level, LogFormat, LogLevel,
    resolve_log_path, LoggingError, LoggingGuard,
};
pub use tracing::{debug, error, info, trace, warn};
