//! Built-in applications for the app daemon
//!
//! - [`PresenceApp`] - debounced per-person presence, loaded automatically
//!   whenever people are configured
//! - [`StateLoggerApp`] - logs the changes of one entity and sun events

pub mod presence;
mod state_logger;

#[cfg(test)]
mod testing;

pub use presence::{PresenceApp, PresenceError, PresenceResult, PRESENCE_APP};
pub use state_logger::{StateLoggerApp, STATE_LOGGER_APP};
