use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single source's enumeration. Never aborts the scan on its own.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    /// Tooling or configuration required by the source is missing or unreadable.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The ecosystem's resolved graph could not be turned into dependencies.
    #[error("resolution error: {0}")]
    Resolution(String),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum CacheError {
    /// A cache file exists but does not parse as a record.
    #[error("corrupt cache file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to write cache file {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed enable/disable configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
