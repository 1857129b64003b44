//! State logger application
//!
//! Logs every change of the entity named by the `entity` property, and
//! wakes up shortly after sunrise and before sunset.
//!
//! ```yaml
//! porch_logger:
//!   app: state_logger
//!   properties:
//!     entity: light.porch
//! ```

use ha_app::{DaemonApplication, SharedHelper};
use ha_config::AppConfig;
use ha_core::Entity;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Name the state logger is registered under
pub const STATE_LOGGER_APP: &str = "state_logger";

/// Property naming the entity to watch
const ENTITY_PROPERTY: &str = "entity";

fn sunrise_offset() -> chrono::Duration {
    chrono::Duration::minutes(30)
}

fn sunset_offset() -> chrono::Duration {
    chrono::Duration::hours(-1)
}

#[derive(Default)]
pub struct StateLoggerApp {
    cancel: Option<CancellationToken>,
}

impl DaemonApplication for StateLoggerApp {
    fn initialize(&mut self, helper: SharedHelper, config: AppConfig) -> bool {
        let Some(entity_id) = config.property(ENTITY_PROPERTY).map(str::to_string) else {
            error!(app = %config.app, "Missing '{}' property", ENTITY_PROPERTY);
            return false;
        };

        let cancel = helper.cancel_token().child_token();
        let (state_tx, state_rx) = mpsc::channel(1);
        let (sunrise_tx, sunrise_rx) = mpsc::channel(1);
        let (sunset_tx, sunset_rx) = mpsc::channel(1);

        helper.listen_state(&entity_id, state_tx);
        helper.at_sunrise(sunrise_offset(), sunrise_tx.clone());
        helper.at_sunset(sunset_offset(), sunset_tx.clone());

        let channels = Channels {
            state: state_rx,
            sunrise: (sunrise_tx, sunrise_rx),
            sunset: (sunset_tx, sunset_rx),
        };
        tokio::spawn(run(helper, channels, cancel.clone()));

        info!(entity_id = %entity_id, "State logger initialized");
        self.cancel = Some(cancel);
        true
    }

    fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

struct Channels {
    state: mpsc::Receiver<Entity>,
    sunrise: (mpsc::Sender<()>, mpsc::Receiver<()>),
    sunset: (mpsc::Sender<()>, mpsc::Receiver<()>),
}

async fn run(helper: SharedHelper, mut channels: Channels, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            Some(entity) = channels.state.recv() => log_change(&entity),
            Some(()) = channels.sunrise.1.recv() => {
                info!("Sunrise");
                helper.at_sunrise(sunrise_offset(), channels.sunrise.0.clone());
            }
            Some(()) = channels.sunset.1.recv() => {
                info!("Sunset");
                helper.at_sunset(sunset_offset(), channels.sunset.0.clone());
            }
        }
    }
    debug!("State logger stopped");
}

fn log_change(entity: &Entity) {
    if entity.state_changed() {
        info!(
            entity_id = %entity.id,
            "State changed from {} to {}", entity.old.state, entity.new.state
        );
    } else {
        debug!(
            entity_id = %entity.id,
            state = %entity.new.state,
            "State unchanged"
        );
    }
}
