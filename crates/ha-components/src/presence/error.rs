//! Error types for presence tracking

use thiserror::Error;

/// Result type for presence operations
pub type PresenceResult<T> = Result<T, PresenceError>;

/// Recoverable presence tracking errors
///
/// The processing loop logs these and carries on with the next message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresenceError {
    /// An update arrived for a device no configured person owns
    #[error("device '{0}' is not configured for any person, please check the configuration")]
    UnknownDevice(String),

    /// A debounce timer fired for a person that is not tracked
    #[error("person '{0}' is not tracked")]
    UnknownPerson(String),
}
