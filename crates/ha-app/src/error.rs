//! Error types for the application registry

use thiserror::Error;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised while building the application registry at startup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("application '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("application name must not be empty")]
    EmptyName,
}
