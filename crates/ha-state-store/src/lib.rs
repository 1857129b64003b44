//! In-memory backend for the app daemon
//!
//! This crate provides the StateStore, an implementation of [`HassClient`]
//! that keeps entity snapshots in memory. Every write produces an
//! `EntityChanged` event carrying the previous snapshot, connecting and
//! disconnecting produce `ConnectivityChanged` events, and service calls are
//! recorded and echoed back as `ServiceInvoked` events.
//!
//! It stands in for a remote backend in the binary and in tests.

use dashmap::DashMap;
use ha_core::{
    domain_of, CallServiceEvent, Entity, EntityId, EntityState, HassClient, HassEvent, Location,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, instrument, trace, warn};

/// Capacity of the event stream
pub const EVENT_BUFFER: usize = 1024;

/// Domain used for service calls that don't name an entity
const DEFAULT_SERVICE_DOMAIN: &str = "homeassistant";

/// A service call received by the store
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCallRecord {
    pub service: String,
    pub data: HashMap<String, String>,
}

/// The state store tracks all entity states
///
/// The StateStore is responsible for:
/// - Storing the current snapshot of every entity
/// - Maintaining a domain index for domain-based queries
/// - Emitting backend events for writes, connectivity and service calls
pub struct StateStore {
    /// All entities keyed by lowercased entity id
    states: DashMap<String, Entity>,
    /// Index of entity ids by domain
    domain_index: DashMap<String, Vec<String>>,
    /// Producer side of the event stream
    events_tx: mpsc::Sender<HassEvent>,
    /// Consumer side, until taken
    events_rx: Mutex<Option<mpsc::Receiver<HassEvent>>>,
    /// Every service call, in order
    service_calls: Mutex<Vec<ServiceCallRecord>>,
    location: RwLock<Location>,
    connected: AtomicBool,
}

impl StateStore {
    /// Create an empty store located at (0, 0)
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        Self {
            states: DashMap::new(),
            domain_index: DashMap::new(),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            service_calls: Mutex::new(Vec::new()),
            location: RwLock::new(Location::default()),
            connected: AtomicBool::new(false),
        }
    }

    /// Set the home location
    pub fn with_location(self, location: Location) -> Self {
        self.set_location(location);
        self
    }

    pub fn set_location(&self, location: Location) {
        *self
            .location
            .write()
            .unwrap_or_else(PoisonError::into_inner) = location;
    }

    /// Set the state of an entity
    ///
    /// If the entity already has a state, the `last_changed` timestamp will
    /// only be updated if the state value actually changed.
    pub fn set(
        &self,
        entity_id: &str,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
    ) -> Entity {
        let new_state = match self.states.get(&entity_id.to_lowercase()) {
            Some(existing) => existing.new.with_update(state, attributes),
            None => EntityState::new(state, attributes),
        };
        self.put(entity_id, new_state)
    }

    /// Store a snapshot as-is and emit the change
    ///
    /// The previous current state becomes the entity's old state.
    #[instrument(skip(self, new_state), fields(entity_id = %entity_id))]
    pub fn put(&self, entity_id: &str, new_state: EntityState) -> Entity {
        let key = entity_id.to_lowercase();
        let previous = self.states.get(&key).map(|e| e.new.clone());

        if previous.is_none() {
            self.domain_index
                .entry(domain_of(&key).to_string())
                .or_default()
                .push(key.clone());
        }

        let entity = Entity::new(key.clone(), previous.unwrap_or_default(), new_state);
        debug!(
            state = %entity.state(),
            changed = entity.state_changed(),
            "Setting entity state"
        );

        self.states.insert(key, entity.clone());
        self.emit(HassEvent::EntityChanged(entity.clone()));
        entity
    }

    /// Get the current snapshot of an entity
    pub fn get(&self, entity_id: &str) -> Option<Entity> {
        self.states
            .get(&entity_id.to_lowercase())
            .map(|e| e.clone())
    }

    /// Get the state value, or None if the entity doesn't exist
    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.get(entity_id).map(|e| e.new.state)
    }

    /// Get all entity ids of a domain
    pub fn entity_ids(&self, domain: &str) -> Vec<String> {
        self.domain_index
            .get(&domain.to_lowercase())
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    /// Get the total number of entities
    pub fn entity_count(&self) -> usize {
        self.states.len()
    }

    /// Report the backend as connected
    pub fn connect(&self) {
        self.set_connected(true);
    }

    /// Report the backend as disconnected
    pub fn disconnect(&self) {
        self.set_connected(false);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        info!(connected, "In-memory backend connectivity changed");
        self.emit(HassEvent::ConnectivityChanged { connected });
    }

    /// Every service call received so far
    pub fn service_calls(&self) -> Vec<ServiceCallRecord> {
        self.service_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Push an event onto the stream as if the backend had sent it
    pub fn emit(&self, event: HassEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(kind = event.kind(), "Event stream full, event dropped");
            }
            Err(TrySendError::Closed(event)) => {
                trace!(kind = event.kind(), "Event stream closed, event dropped");
            }
        }
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HassClient for StateStore {
    fn start(&self, host: &str, ssl: bool, _token: &str) {
        info!(host, ssl, "Starting in-memory backend");
        self.connect();
    }

    fn stop(&self) {
        if self.is_connected() {
            self.disconnect();
        }
    }

    fn take_event_stream(&self) -> Option<mpsc::Receiver<HassEvent>> {
        self.events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn get_entity(&self, entity_id: &str) -> Option<Entity> {
        self.get(entity_id)
    }

    fn set_entity(&self, entity: &Entity) -> bool {
        let id = match entity.id.parse::<EntityId>() {
            Ok(id) => id,
            Err(e) => {
                warn!(entity_id = %entity.id, "Rejected entity: {}", e);
                return false;
            }
        };
        self.set(
            &id.to_string(),
            entity.new.state.clone(),
            entity.new.attributes.clone(),
        );
        true
    }

    fn call_service(&self, service: &str, data: HashMap<String, String>) {
        let domain = data
            .get("entity_id")
            .map(|id| domain_of(id).to_lowercase())
            .unwrap_or_else(|| DEFAULT_SERVICE_DOMAIN.to_string());
        debug!(domain = %domain, service, "Service called");

        let service_data = serde_json::to_value(&data).unwrap_or_default();
        self.service_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ServiceCallRecord {
                service: service.to_string(),
                data,
            });

        self.emit(HassEvent::ServiceInvoked(CallServiceEvent::new(
            domain,
            service,
            service_data,
        )));
    }

    fn location(&self) -> Location {
        *self.location.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Thread-safe wrapper for StateStore
pub type SharedStateStore = Arc<StateStore>;
