//! Error types for the daemon runtime

use ha_config::ConfigError;
use thiserror::Error;

/// Errors that keep the daemon from starting
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend event stream was already taken")]
    EventStreamTaken,
}

/// Result type for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
