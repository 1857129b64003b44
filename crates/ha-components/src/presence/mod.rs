//! Presence tracking application
//!
//! Aggregates the configured devices of every person into one debounced
//! presence label and publishes it as `sensor.<person>_presence`.
//!
//! The daemon loads this application on its own whenever people are
//! configured. Everything runs on one task per instance: device updates
//! and debounce expiries are both messages on that task's channels.

mod distance;
mod error;
mod label;
mod tracker;

pub use distance::distance;
pub use error::{PresenceError, PresenceResult};
pub use label::{next_label, translate_state, PresenceLabel, Trigger, HOME, NOT_HOME};
pub use tracker::{
    aggregate_state, presence_entity_id, DebounceExpired, PersonRecord, PresenceTracker,
    PresenceUpdate, GPS_FRESHNESS_MINUTES,
};

use ha_app::{DaemonApplication, SharedHelper};
use ha_config::AppConfig;
use ha_core::Entity;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Name the presence application is known by
pub const PRESENCE_APP: &str = "presence";

/// Capacity of the device update channel
const DEVICE_CHANNEL_SIZE: usize = 10;

/// Capacity of the debounce expiry channel
const TIMEOUT_CHANNEL_SIZE: usize = 4;

/// The presence application
#[derive(Default)]
pub struct PresenceApp {
    cancel: Option<CancellationToken>,
}

impl PresenceApp {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DaemonApplication for PresenceApp {
    fn initialize(&mut self, helper: SharedHelper, _config: AppConfig) -> bool {
        let people = helper.people();
        if people.is_empty() {
            debug!("No people configured, presence tracking idle");
            return false;
        }

        let cancel = helper.cancel_token().child_token();
        let (device_tx, device_rx) = mpsc::channel(DEVICE_CHANNEL_SIZE);
        let (timeout_tx, timeout_rx) = mpsc::channel(TIMEOUT_CHANNEL_SIZE);

        let mut tracker = PresenceTracker::new(
            helper.clone(),
            &people,
            helper.presence_settings(),
            timeout_tx,
            cancel.clone(),
        );

        tracker.refresh_all();

        for device in tracker.devices() {
            helper.listen_state(device, device_tx.clone());
        }

        tokio::spawn(run(tracker, device_rx, timeout_rx, cancel.clone()));
        self.cancel = Some(cancel);

        info!(people = people.len(), "Presence tracking initialized");
        true
    }

    fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

async fn run(
    mut tracker: PresenceTracker,
    mut devices: mpsc::Receiver<Entity>,
    mut timeouts: mpsc::Receiver<DebounceExpired>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            Some(entity) = devices.recv() => {
                if let Err(e) = tracker.handle_device(&entity.id) {
                    error!("{}", e);
                }
            }
            Some(expired) = timeouts.recv() => {
                if let Err(e) = tracker.handle_timeout(&expired) {
                    error!("{}", e);
                }
            }
        }
    }
    debug!("Presence loop stopped");
}
