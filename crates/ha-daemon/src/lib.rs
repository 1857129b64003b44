//! App daemon runtime
//!
//! Wires a backend ([`HassClient`](ha_core::HassClient)) to the event
//! dispatcher and manages the application lifecycle: every time the backend
//! connects, all configured applications are (re)loaded with a fresh
//! session; every time it disconnects, they are cancelled and all
//! subscriptions are dropped.
//!
//! Cancellation is hierarchical: the daemon owns the root token, each
//! session is a child of it, and applications derive their own tokens from
//! the session.

mod config;
mod daemon;
mod error;
mod helper;
mod lifecycle;

pub use config::{load_config, StartupConfig, HASSIO_TOKEN_VAR};
pub use daemon::ApplicationDaemon;
pub use error::{DaemonError, DaemonResult};
pub use helper::{SessionHelper, SharedClient};
pub use lifecycle::AppManager;
