//! The helper handed to applications during a session

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use ha_app::{next_solar_time, schedule_after, DaemonAppHelper, ScheduledTask, SolarEvent};
use ha_config::{DaemonConfig, PersonConfig, TrackingSettings};
use ha_core::{Entity, HassClient, Location, SUN_ENTITY};
use ha_event_bus::{EntitySender, ServiceSender, SharedEventDispatcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

/// Shared handle to the backend
pub type SharedClient = Arc<dyn HassClient>;

/// Helper bound to one session
///
/// Every subscription goes to the shared dispatcher, every scheduled task
/// is a child of the session token.
pub struct SessionHelper {
    client: SharedClient,
    dispatcher: SharedEventDispatcher,
    config: Arc<DaemonConfig>,
    session: CancellationToken,
    root: CancellationToken,
}

impl SessionHelper {
    pub fn new(
        client: SharedClient,
        dispatcher: SharedEventDispatcher,
        config: Arc<DaemonConfig>,
        session: CancellationToken,
        root: CancellationToken,
    ) -> Self {
        Self {
            client,
            dispatcher,
            config,
            session,
            root,
        }
    }
}

impl DaemonAppHelper for SessionHelper {
    fn cancel_token(&self) -> CancellationToken {
        self.session.clone()
    }

    fn shutdown(&self) {
        debug!("Shutdown requested by an application");
        self.root.cancel();
    }

    fn get_entity(&self, entity_id: &str) -> Option<Entity> {
        self.client.get_entity(entity_id)
    }

    fn set_entity(&self, entity: &Entity) -> bool {
        self.client.set_entity(entity)
    }

    fn call_service(&self, service: &str, data: HashMap<String, String>) {
        trace!(service, "Calling service");
        self.client.call_service(service, data);
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
        let Some(sun) = self.client.get_entity(SUN_ENTITY) else {
            error!(%event, "{} is not available, not scheduled", SUN_ENTITY);
            return None;
        };

        let now = Utc::now();
        let at = next_solar_time(&sun, event, offset, now)?;
        let delay = (at - now).to_std().unwrap_or_default();
        debug!(%event, %at, "Scheduled");

        Some(schedule_after(delay, &self.session, async move {
            if tx.send(()).await.is_err() {
                trace!(%event, "Scheduled wake-up has no receiver");
            }
        }))
    }

    fn location(&self) -> Location {
        self.client.location()
    }

    fn people(&self) -> BTreeMap<String, PersonConfig> {
        self.config.people.clone()
    }

    fn presence_settings(&self) -> TrackingSettings {
        self.config.settings.tracking.clone()
    }
}
