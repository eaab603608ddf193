//! Error types for the core module

use std::path::PathBuf;

use mailpush_imap::ConnectError;
use thiserror::Error;

/// Errors raised while loading the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not valid YAML for our schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml_bw::Error),

    /// Parsed, but a value is unusable
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Failures that stop the watch loop for good
#[derive(Debug, Error)]
pub enum WatchError {
    /// Never managed to open a session at all
    #[error("Initial IMAP connection failed: {0}")]
    InitialConnect(#[source] ConnectError),

    /// Retrying cannot change server capabilities
    #[error("Server must support IMAP IDLE")]
    IdleUnsupported,
}
