//! Subscription table and fan-out

use std::time::Duration;

use dashmap::DashMap;
use ha_core::{domain_of, CallServiceEvent, Entity, HassEvent};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::DaemonCommand;

/// How long a single delivery may wait for room in a subscriber's channel
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Channel on which an application receives entity changes
pub type EntitySender = mpsc::Sender<Entity>;

/// Channel on which an application receives service-call events
pub type ServiceSender = mpsc::Sender<CallServiceEvent>;

/// Routes backend events to subscribed channels
///
/// Keys are case-folded. Within one key a channel is registered at most once,
/// compared by channel identity rather than by value.
pub struct EventDispatcher {
    /// Entity-id and domain keys to their subscribers
    state_listeners: DashMap<String, Vec<EntitySender>>,
    /// (domain, service) keys to their subscribers
    service_listeners: DashMap<(String, String), Vec<ServiceSender>>,
    /// Upper bound on how long one send may wait
    send_timeout: Duration,
}

impl EventDispatcher {
    /// Create a dispatcher with the default send timeout
    pub fn new() -> Self {
        Self::with_send_timeout(DEFAULT_SEND_TIMEOUT)
    }

    /// Create a dispatcher with a custom send timeout
    pub fn with_send_timeout(send_timeout: Duration) -> Self {
        Self {
            state_listeners: DashMap::new(),
            service_listeners: DashMap::new(),
            send_timeout,
        }
    }

    /// The configured send timeout
    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Subscribe a channel to changes of one entity
    ///
    /// Returns `false` if this channel is already registered under the key.
    #[instrument(skip(self, tx))]
    pub fn subscribe_state(&self, entity_id: &str, tx: EntitySender) -> bool {
        let key = entity_id.to_lowercase();
        let mut listeners = self.state_listeners.entry(key.clone()).or_default();

        if listeners.iter().any(|existing| existing.same_channel(&tx)) {
            warn!(key = %key, "Channel already subscribed to state changes, ignoring");
            return false;
        }

        listeners.push(tx);
        trace!(key = %key, subscribers = listeners.len(), "Subscribed to state changes");
        true
    }

    /// Subscribe a channel to every entity of a domain
    pub fn subscribe_domain(&self, domain: &str, tx: EntitySender) -> bool {
        self.subscribe_state(domain_of(domain), tx)
    }

    /// Subscribe a channel to calls of one service
    #[instrument(skip(self, tx))]
    pub fn subscribe_service(&self, domain: &str, service: &str, tx: ServiceSender) -> bool {
        let key = (domain.to_lowercase(), service.to_lowercase());
        let mut listeners = self.service_listeners.entry(key.clone()).or_default();

        if listeners.iter().any(|existing| existing.same_channel(&tx)) {
            warn!(
                domain = %key.0,
                service = %key.1,
                "Channel already subscribed to service calls, ignoring"
            );
            return false;
        }

        listeners.push(tx);
        true
    }

    /// Drop every subscription
    ///
    /// Channels registered before this call never receive anything again
    /// from this dispatcher.
    pub fn clear(&self) {
        debug!(
            state_keys = self.state_listeners.len(),
            service_keys = self.service_listeners.len(),
            "Clearing all subscriptions"
        );
        self.state_listeners.clear();
        self.service_listeners.clear();
    }

    /// Number of channels subscribed under an entity-id or domain key
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.state_listeners
            .get(&key.to_lowercase())
            .map(|l| l.len())
            .unwrap_or(0)
    }

    /// Number of channels subscribed to a service
    pub fn service_subscriber_count(&self, domain: &str, service: &str) -> usize {
        self.service_listeners
            .get(&(domain.to_lowercase(), service.to_lowercase()))
            .map(|l| l.len())
            .unwrap_or(0)
    }

    /// True when no key has any subscriber
    pub fn is_empty(&self) -> bool {
        self.state_listeners.is_empty() && self.service_listeners.is_empty()
    }

    /// Route one backend event
    ///
    /// Connectivity changes become commands on the control queue. Entity
    /// changes without a previous state are the backend's initial snapshot
    /// and are not forwarded.
    pub async fn dispatch(
        &self,
        event: HassEvent,
        commands: &mpsc::Sender<DaemonCommand>,
        cancel: &CancellationToken,
    ) {
        match event {
            HassEvent::ConnectivityChanged { connected } => {
                let command = DaemonCommand::from_connectivity(connected);
                info!(connected, ?command, "Backend connectivity changed");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {}
                    result = commands.send(command) => {
                        if result.is_err() {
                            warn!(?command, "Control loop is gone, command dropped");
                        }
                    }
                }
            }
            HassEvent::EntityChanged(entity) => {
                if entity.old.is_empty() {
                    trace!(entity_id = %entity.id, "Skipping initial snapshot");
                    return;
                }
                self.publish_entity(&entity, cancel).await;
            }
            HassEvent::ServiceInvoked(call) => {
                self.publish_service(&call, cancel).await;
            }
        }
    }

    /// Deliver an entity change to its id subscribers and its domain subscribers
    ///
    /// Returns the number of channels that accepted the event.
    #[instrument(skip_all, fields(entity_id = %entity.id))]
    pub async fn publish_entity(&self, entity: &Entity, cancel: &CancellationToken) -> usize {
        let entity_key = entity.id.to_lowercase();
        let domain_key = domain_of(&entity_key).to_string();

        let mut delivered = self
            .deliver(self.state_senders(&entity_key), entity, &entity_key, cancel)
            .await;

        if domain_key != entity_key && !cancel.is_cancelled() {
            delivered += self
                .deliver(self.state_senders(&domain_key), entity, &domain_key, cancel)
                .await;
        }

        delivered
    }

    /// Deliver a service-call event to subscribers of exactly that service
    #[instrument(skip_all, fields(service = %call.service_id()))]
    pub async fn publish_service(
        &self,
        call: &CallServiceEvent,
        cancel: &CancellationToken,
    ) -> usize {
        let key = (call.domain.to_lowercase(), call.service.to_lowercase());
        let senders = self
            .service_listeners
            .get(&key)
            .map(|l| l.clone())
            .unwrap_or_default();

        self.deliver(senders, call, &call.service_id(), cancel)
            .await
    }

    /// Snapshot of the subscribers under a key, so no map guard is held
    /// across an await
    fn state_senders(&self, key: &str) -> Vec<EntitySender> {
        self.state_listeners
            .get(key)
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    async fn deliver<T: Clone + Send>(
        &self,
        senders: Vec<mpsc::Sender<T>>,
        value: &T,
        key: &str,
        cancel: &CancellationToken,
    ) -> usize {
        let mut delivered = 0;

        for tx in senders {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(key = %key, "Delivery aborted by cancellation");
                    break;
                }
                result = tx.send_timeout(value.clone(), self.send_timeout) => match result {
                    Ok(()) => delivered += 1,
                    Err(SendTimeoutError::Timeout(_)) => {
                        error!(
                            key = %key,
                            timeout_ms = self.send_timeout.as_millis() as u64,
                            "Channel full, please check the receiving application"
                        );
                    }
                    Err(SendTimeoutError::Closed(_)) => {
                        debug!(key = %key, "Subscriber channel closed, event dropped");
                    }
                },
            }
        }

        delivered
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ha_core::EntityState;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio_test::assert_err;

    fn changed(id: &str, from: &str, to: &str) -> Entity {
        Entity::new(
            id,
            EntityState::new(from, HashMap::new()),
            EntityState::new(to, HashMap::new()),
        )
    }

    #[tokio::test]
    async fn test_duplicate_subscription_delivers_once() {
        let dispatcher = EventDispatcher::new();
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(4);

        assert!(dispatcher.subscribe_state("light.kitchen", tx.clone()));
        assert!(!dispatcher.subscribe_state("light.kitchen", tx));
        assert_eq!(dispatcher.subscriber_count("light.kitchen"), 1);

        let delivered = dispatcher
            .publish_entity(&changed("light.kitchen", "off", "on"), &cancel)
            .await;

        assert_eq!(delivered, 1);
        assert_eq!(rx.recv().await.unwrap().state(), "on");
        assert_err!(rx.try_recv());
    }

    #[tokio::test]
    async fn test_each_distinct_subscriber_receives_once() {
        let dispatcher = EventDispatcher::new();
        let cancel = CancellationToken::new();

        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (tx, rx) = mpsc::channel(4);
            assert!(dispatcher.subscribe_state("sensor.temp", tx));
            receivers.push(rx);
        }

        let delivered = dispatcher
            .publish_entity(&changed("sensor.temp", "20", "21"), &cancel)
            .await;
        assert_eq!(delivered, 3);

        for rx in &mut receivers {
            assert_eq!(rx.recv().await.unwrap().state(), "21");
            assert_err!(rx.try_recv());
        }
    }

    #[tokio::test]
    async fn test_keys_are_case_folded() {
        let dispatcher = EventDispatcher::new();
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(4);

        dispatcher.subscribe_state("Light.Kitchen", tx);
        dispatcher
            .publish_entity(&changed("light.kitchen", "off", "on"), &cancel)
            .await;

        assert_eq!(rx.recv().await.unwrap().id, "light.kitchen");
    }

    #[tokio::test]
    async fn test_domain_subscriber_receives_every_entity() {
        let dispatcher = EventDispatcher::new();
        let cancel = CancellationToken::new();
        let (domain_tx, mut domain_rx) = mpsc::channel(4);
        let (entity_tx, mut entity_rx) = mpsc::channel(4);

        dispatcher.subscribe_domain("light", domain_tx);
        dispatcher.subscribe_state("light.hall", entity_tx);

        dispatcher
            .publish_entity(&changed("light.hall", "off", "on"), &cancel)
            .await;
        dispatcher
            .publish_entity(&changed("light.porch", "on", "off"), &cancel)
            .await;
        dispatcher
            .publish_entity(&changed("switch.fan", "on", "off"), &cancel)
            .await;

        assert_eq!(domain_rx.recv().await.unwrap().id, "light.hall");
        assert_eq!(domain_rx.recv().await.unwrap().id, "light.porch");
        assert_err!(domain_rx.try_recv());

        assert_eq!(entity_rx.recv().await.unwrap().id, "light.hall");
        assert_err!(entity_rx.try_recv());
    }

    #[tokio::test]
    async fn test_service_events_match_exact_pair() {
        let dispatcher = EventDispatcher::new();
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(4);

        assert!(dispatcher.subscribe_service("Light", "Turn_On", tx.clone()));
        assert!(!dispatcher.subscribe_service("light", "turn_on", tx));
        assert_eq!(dispatcher.service_subscriber_count("light", "turn_on"), 1);

        let on = CallServiceEvent::new("light", "turn_on", json!({"entity_id": "light.a"}));
        let off = CallServiceEvent::new("light", "turn_off", json!({}));

        assert_eq!(dispatcher.publish_service(&on, &cancel).await, 1);
        assert_eq!(dispatcher.publish_service(&off, &cancel).await, 0);

        assert_eq!(rx.recv().await.unwrap().service, "turn_on");
        assert_err!(rx.try_recv());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_channel_is_bounded_and_dropped() {
        let timeout = Duration::from_millis(200);
        let dispatcher = EventDispatcher::with_send_timeout(timeout);
        let cancel = CancellationToken::new();

        let (stuck_tx, mut stuck_rx) = mpsc::channel(1);
        let (ok_tx, mut ok_rx) = mpsc::channel(4);
        dispatcher.subscribe_state("sensor.door", stuck_tx.clone());
        dispatcher.subscribe_state("sensor.door", ok_tx);

        // Nobody drains this one
        stuck_tx
            .send(changed("sensor.door", "a", "b"))
            .await
            .unwrap();

        let started = tokio::time::Instant::now();
        let delivered = dispatcher
            .publish_entity(&changed("sensor.door", "closed", "open"), &cancel)
            .await;

        assert_eq!(delivered, 1);
        assert!(started.elapsed() >= timeout);
        assert!(started.elapsed() < timeout * 2);
        assert_eq!(ok_rx.recv().await.unwrap().state(), "open");
        assert_eq!(stuck_rx.recv().await.unwrap().state(), "b");
        assert_err!(stuck_rx.try_recv());
    }

    #[tokio::test]
    async fn test_cancellation_aborts_delivery() {
        let dispatcher = EventDispatcher::new();
        let cancel = CancellationToken::new();
        let (tx, _rx) = mpsc::channel(1);

        dispatcher.subscribe_state("sensor.door", tx.clone());
        tx.send(changed("sensor.door", "a", "b")).await.unwrap();

        cancel.cancel();
        let delivered = tokio::time::timeout(
            Duration::from_secs(1),
            dispatcher.publish_entity(&changed("sensor.door", "closed", "open"), &cancel),
        )
        .await
        .expect("cancelled delivery must not wait for the send timeout");

        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_clear_forgets_old_channels() {
        let dispatcher = EventDispatcher::new();
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(4);
        let (svc_tx, mut svc_rx) = mpsc::channel(4);

        dispatcher.subscribe_state("light.kitchen", tx);
        dispatcher.subscribe_service("light", "turn_on", svc_tx);
        dispatcher.clear();

        assert!(dispatcher.is_empty());
        assert_eq!(
            dispatcher
                .publish_entity(&changed("light.kitchen", "off", "on"), &cancel)
                .await,
            0
        );
        assert_eq!(
            dispatcher
                .publish_service(
                    &CallServiceEvent::new("light", "turn_on", json!({})),
                    &cancel
                )
                .await,
            0
        );
        // Every sender was dropped with the table
        assert!(rx.recv().await.is_none());
        assert!(svc_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dispatch_skips_initial_snapshot() {
        let dispatcher = EventDispatcher::new();
        let cancel = CancellationToken::new();
        let (commands, _command_rx) = mpsc::channel(1);
        let (tx, mut rx) = mpsc::channel(4);
        dispatcher.subscribe_state("light.kitchen", tx);

        let initial = Entity::with_state("light.kitchen", EntityState::new("on", HashMap::new()));
        dispatcher
            .dispatch(HassEvent::EntityChanged(initial), &commands, &cancel)
            .await;
        assert_err!(rx.try_recv());

        dispatcher
            .dispatch(
                HassEvent::EntityChanged(changed("light.kitchen", "on", "off")),
                &commands,
                &cancel,
            )
            .await;
        assert_eq!(rx.recv().await.unwrap().state(), "off");
    }

    #[tokio::test]
    async fn test_dispatch_connectivity_becomes_commands() {
        let dispatcher = EventDispatcher::new();
        let cancel = CancellationToken::new();
        let (commands, mut command_rx) = mpsc::channel(4);

        dispatcher
            .dispatch(
                HassEvent::ConnectivityChanged { connected: true },
                &commands,
                &cancel,
            )
            .await;
        dispatcher
            .dispatch(
                HassEvent::ConnectivityChanged { connected: false },
                &commands,
                &cancel,
            )
            .await;

        assert_eq!(
            command_rx.recv().await,
            Some(DaemonCommand::StartApplications)
        );
        assert_eq!(
            command_rx.recv().await,
            Some(DaemonCommand::StopApplications)
        );
    }
}
