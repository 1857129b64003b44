//! Live view of one entity

use std::collections::HashMap;

use ha_core::Entity;
use ha_event_bus::DEFAULT_SEND_TIMEOUT;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::SharedHelper;

/// Capacity of the channel a proxy listens on
pub const PROXY_CHANNEL_SIZE: usize = 2;

/// A self-updating view of one entity
///
/// The proxy subscribes to its entity on construction and runs one task
/// that merges every update into the view. Clones share the same view.
/// The task ends when the session's cancellation token fires.
#[derive(Debug, Clone)]
pub struct EntityProxy {
    id: String,
    view: watch::Receiver<Entity>,
}

/// Create a proxy for `entity_id`, optionally forwarding it to `consumer`
/// after every update
pub fn new_entity(
    helper: &SharedHelper,
    entity_id: impl Into<String>,
    consumer: Option<mpsc::Sender<EntityProxy>>,
) -> EntityProxy {
    EntityProxy::new(helper, entity_id, consumer)
}

impl EntityProxy {
    /// Fetch the entity (or assume it unknown), subscribe, and start the pump
    pub fn new(
        helper: &SharedHelper,
        entity_id: impl Into<String>,
        consumer: Option<mpsc::Sender<EntityProxy>>,
    ) -> Self {
        let id = entity_id.into();
        let initial = helper.get_entity(&id).unwrap_or_else(|| {
            debug!(entity_id = %id, "Entity not known to the backend, assuming unknown");
            Entity::unknown(&id)
        });

        let (view_tx, view_rx) = watch::channel(initial);
        let proxy = Self {
            id: id.clone(),
            view: view_rx,
        };

        let (tx, rx) = mpsc::channel(PROXY_CHANNEL_SIZE);
        helper.listen_state(&id, tx);

        tokio::spawn(message_pump(
            proxy.clone(),
            view_tx,
            rx,
            consumer,
            helper.cancel_token(),
        ));

        proxy
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Copy of the current view
    pub fn entity(&self) -> Entity {
        self.view.borrow().clone()
    }

    pub fn state(&self) -> String {
        self.view.borrow().new.state.clone()
    }

    pub fn attributes(&self) -> HashMap<String, serde_json::Value> {
        self.view.borrow().new.attributes.clone()
    }

    /// Wait until the view changes after the last call
    ///
    /// Returns `false` once the proxy's task has ended.
    pub async fn changed(&mut self) -> bool {
        self.view.changed().await.is_ok()
    }
}

/// Fold an update into the view: state replaced, attributes merged key by
/// key, previous snapshot replaced
fn merge(view: &mut Entity, update: Entity) {
    view.new.state = update.new.state;
    view.new.last_changed = update.new.last_changed;
    view.new.last_updated = update.new.last_updated;
    view.new.attributes.extend(update.new.attributes);
    view.old = update.old;
}

async fn message_pump(
    proxy: EntityProxy,
    view_tx: watch::Sender<Entity>,
    mut rx: mpsc::Receiver<Entity>,
    consumer: Option<mpsc::Sender<EntityProxy>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            update = rx.recv() => {
                let Some(update) = update else {
                    // Unsubscribed; stay alive until the session ends.
                    cancel.cancelled().await;
                    break;
                };

                trace!(entity_id = %proxy.id, state = %update.new.state, "Entity proxy update");
                view_tx.send_modify(|view| merge(view, update));

                if let Some(consumer) = &consumer {
                    forward(&proxy, consumer, &cancel).await;
                }
            }
        }
    }
    trace!(entity_id = %proxy.id, "Entity proxy stopped");
}

async fn forward(
    proxy: &EntityProxy,
    consumer: &mpsc::Sender<EntityProxy>,
    cancel: &CancellationToken,
) {
    tokio::select! {
        biased;
        () = cancel.cancelled() => {}
        result = consumer.send_timeout(proxy.clone(), DEFAULT_SEND_TIMEOUT) => match result {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                error!(entity_id = %proxy.id, "Consumer channel full, entity update dropped");
            }
            Err(SendTimeoutError::Closed(_)) => {
                debug!(entity_id = %proxy.id, "Consumer channel closed");
            }
        }
    }
}
