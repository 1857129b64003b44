//! The surface the daemon exposes to applications

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ha_config::{PersonConfig, TrackingSettings};
use ha_core::{services, Entity, Location};
use ha_event_bus::{EntitySender, ServiceSender};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{ScheduledTask, SolarEvent};

/// Shared handle to the helper
pub type SharedHelper = Arc<dyn DaemonAppHelper>;

/// Service data addressing a single entity
pub fn entity_service_data(entity_id: &str) -> HashMap<String, String> {
    HashMap::from([("entity_id".to_string(), entity_id.to_string())])
}

/// What an application can ask of the daemon
pub trait DaemonAppHelper: Send + Sync {
    /// Token cancelled when the current session ends
    fn cancel_token(&self) -> CancellationToken;

    /// Stop the whole daemon. Applications should rarely need this.
    fn shutdown(&self);

    /// Current snapshot of an entity
    fn get_entity(&self, entity_id: &str) -> Option<Entity>;

    /// Create or update an entity on the backend
    fn set_entity(&self, entity: &Entity) -> bool;

    /// Invoke a backend service with string parameters
    fn call_service(&self, service: &str, data: HashMap<String, String>);

    fn turn_on(&self, entity_id: &str) {
        self.call_service(services::TURN_ON, entity_service_data(entity_id));
    }

    fn turn_off(&self, entity_id: &str) {
        self.call_service(services::TURN_OFF, entity_service_data(entity_id));
    }

    fn toggle(&self, entity_id: &str) {
        self.call_service(services::TOGGLE, entity_service_data(entity_id));
    }

    /// Receive every change of one entity
    fn listen_state(&self, entity_id: &str, tx: EntitySender) -> bool;

    /// Receive every change of every entity in a domain
    fn listen_domain(&self, domain: &str, tx: EntitySender) -> bool;

    /// Receive service calls for a `(domain, service)` pair
    fn listen_call_service(&self, domain: &str, service: &str, tx: ServiceSender) -> bool;

    /// Send `()` on `tx` once, at the next solar event shifted by `offset`
    ///
    /// Returns `None` when the time could not be determined.
    fn schedule_at(
        &self,
        event: SolarEvent,
        offset: chrono::Duration,
        tx: mpsc::Sender<()>,
    ) -> Option<ScheduledTask>;

    fn at_sunrise(&self, offset: chrono::Duration, tx: mpsc::Sender<()>) -> Option<ScheduledTask> {
        self.schedule_at(SolarEvent::Sunrise, offset, tx)
    }

    fn at_sunset(&self, offset: chrono::Duration, tx: mpsc::Sender<()>) -> Option<ScheduledTask> {
        self.schedule_at(SolarEvent::Sunset, offset, tx)
    }

    /// Home location
    fn location(&self) -> Location;

    /// Configured people, keyed by person id
    fn people(&self) -> BTreeMap<String, PersonConfig>;

    /// Presence tracking tuning
    fn presence_settings(&self) -> TrackingSettings;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_service_data() {
        let data = entity_service_data("light.porch");
        assert_eq!(data.len(), 1);
        assert_eq!(data["entity_id"], "light.porch");
    }
}
