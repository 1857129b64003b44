//! Application API for the app daemon
//!
//! Applications are statically compiled types implementing
//! [`DaemonApplication`]. At startup the binary registers a constructor for
//! each type in an [`AppRegistry`]; every time the backend connects, the
//! daemon builds fresh instances from the configured descriptors and hands
//! each one a [`DaemonAppHelper`] through which it subscribes to entities,
//! reads and writes state, calls services and schedules solar wake-ups.
//!
//! # Key Types
//!
//! - [`DaemonApplication`] - An application instance
//! - [`DaemonAppHelper`] - What the daemon offers to applications
//! - [`AppRegistry`] - Name to constructor map
//! - [`EntityProxy`] - Live, self-updating view of one entity
//! - [`ScheduledTask`] - Cancellable one-shot delayed task

mod application;
mod error;
mod helper;
mod proxy;
mod registry;
mod schedule;

#[cfg(test)]
mod testing;

pub use application::DaemonApplication;
pub use error::{RegistryError, RegistryResult};
pub use helper::{entity_service_data, DaemonAppHelper, SharedHelper};
pub use proxy::{new_entity, EntityProxy, PROXY_CHANNEL_SIZE};
pub use registry::{AppFactory, AppRegistry};
pub use schedule::{next_solar_time, schedule_after, ScheduledTask, SolarEvent};
