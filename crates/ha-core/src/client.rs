//! The backend collaborator seam

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::{Entity, HassEvent, Location};

/// Connection to the upstream smart-home backend
///
/// Implementations own the transport (connection, authentication,
/// reconnection) and a cache of current entity snapshots. The daemon only
/// talks to the backend through this trait.
pub trait HassClient: Send + Sync {
    /// Start connecting. Connectivity is reported on the event stream.
    fn start(&self, host: &str, ssl: bool, token: &str);

    /// Disconnect and stop reconnecting
    fn stop(&self);

    /// Hand over the event stream. Returns `None` once it has been taken.
    fn take_event_stream(&self) -> Option<mpsc::Receiver<HassEvent>>;

    /// Current snapshot of an entity, if the backend knows it
    fn get_entity(&self, entity_id: &str) -> Option<Entity>;

    /// Create or update an entity on the backend
    fn set_entity(&self, entity: &Entity) -> bool;

    /// Invoke a service (e.g., "turn_on") with string parameters
    fn call_service(&self, service: &str, data: HashMap<String, String>);

    /// Home location configured on the backend
    fn location(&self) -> Location;
}
