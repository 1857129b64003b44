//! Helper implementation over the in-memory backend, for unit tests

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use ha_config::{PersonConfig, TrackingSettings};
use ha_core::{Entity, HassClient, Location, SUN_ENTITY};
use ha_event_bus::{EntitySender, EventDispatcher, ServiceSender};
use ha_state_store::StateStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    next_solar_time, schedule_after, DaemonAppHelper, ScheduledTask, SharedHelper, SolarEvent,
};

#[derive(Clone)]
pub(crate) struct TestHelper {
    pub store: Arc<StateStore>,
    pub dispatcher: Arc<EventDispatcher>,
    pub token: CancellationToken,
}

impl TestHelper {
    pub fn new() -> Self {
        Self {
            store: Arc::new(StateStore::new()),
            dispatcher: Arc::new(EventDispatcher::new()),
            token: CancellationToken::new(),
        }
    }

    pub fn shared(&self) -> SharedHelper {
        Arc::new(self.clone())
    }

    pub async fn publish(&self, entity: Entity) -> usize {
        self.dispatcher
            .publish_entity(&entity, &CancellationToken::new())
            .await
    }
}

impl DaemonAppHelper for TestHelper {
    fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    fn shutdown(&self) {
        self.token.cancel();
    }

    fn get_entity(&self, entity_id: &str) -> Option<Entity> {
        self.store.get_entity(entity_id)
    }

    fn set_entity(&self, entity: &Entity) -> bool {
        self.store.set_entity(entity)
    }

    fn call_service(&self, service: &str, data: HashMap<String, String>) {
        self.store.call_service(service, data);
    }

    fn listen_state(&self, entity_id: &str, tx: EntitySender) -> bool {
        self.dispatcher.subscribe_state(entity_id, tx)
    }

    fn listen_domain(&self, domain: &str, tx: EntitySender) -> bool {
        self.dispatcher.subscribe_domain(domain, tx)
    }

    fn listen_call_service(&self, domain: &str, service: &str, tx: ServiceSender) -> bool {
        self.dispatcher.subscribe_service(domain, service, tx)
    }

    fn schedule_at(
        &self,
        event: SolarEvent,
        offset: chrono::Duration,
        tx: mpsc::Sender<()>,
    ) -> Option<ScheduledTask> {
        let sun = self.store.get_entity(SUN_ENTITY)?;
        let now = Utc::now();
        let at = next_solar_time(&sun, event, offset, now)?;
        let delay = (at - now).to_std().ok()?;
        Some(schedule_after(delay, &self.token, async move {
            let _ = tx.send(()).await;
        }))
    }

    fn location(&self) -> Location {
        self.store.location()
    }

    fn people(&self) -> BTreeMap<String, PersonConfig> {
        BTreeMap::new()
    }

    fn presence_settings(&self) -> TrackingSettings {
        TrackingSettings::default()
    }
}
