//! The running daemon
//!
//! Two tasks make up a running daemon:
//!
//! - the receive loop drains the backend's event stream and publishes each
//!   event inline, turning connectivity changes into control commands
//! - the control loop starts and stops applications, one command at a time
//!
//! Both stop when the root cancellation token fires.

use std::path::PathBuf;
use std::sync::Arc;

use ha_app::AppRegistry;
use ha_config::{DaemonConfig, DEFAULT_OPTIONS_PATH};
use ha_core::HassEvent;
use ha_event_bus::{DaemonCommand, EventDispatcher, SharedEventDispatcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::helper::SharedClient;
use crate::lifecycle::AppManager;
use crate::{load_config, DaemonError, DaemonResult};

/// Capacity of the control command queue
const COMMAND_CHANNEL_SIZE: usize = 8;

/// A started daemon
pub struct ApplicationDaemon {
    client: SharedClient,
    dispatcher: SharedEventDispatcher,
    root: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ApplicationDaemon {
    /// Load the configuration of `config_dir` and start
    pub fn start(
        config_dir: impl Into<PathBuf>,
        client: SharedClient,
        registry: AppRegistry,
    ) -> DaemonResult<Self> {
        let config_dir = config_dir.into();
        let config = load_config(&config_dir, DEFAULT_OPTIONS_PATH)?;
        Self::start_with_config(config_dir, config.daemon, client, registry)
    }

    /// Start with an already loaded configuration
    ///
    /// Takes the backend's event stream, spawns the receive and control
    /// loops, then asks the backend to connect.
    #[instrument(skip_all, fields(config_dir = ?config_dir))]
    pub fn start_with_config(
        config_dir: PathBuf,
        config: DaemonConfig,
        client: SharedClient,
        registry: AppRegistry,
    ) -> DaemonResult<Self> {
        let events = client
            .take_event_stream()
            .ok_or(DaemonError::EventStreamTaken)?;

        let root = CancellationToken::new();
        let dispatcher: SharedEventDispatcher = Arc::new(EventDispatcher::new());
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        let backend = config.home_assistant.clone();
        let manager = AppManager::new(
            config_dir,
            Arc::new(config),
            registry,
            client.clone(),
            dispatcher.clone(),
            root.clone(),
        );

        let tasks = vec![
            tokio::spawn(receive_loop(
                events,
                dispatcher.clone(),
                commands_tx,
                root.clone(),
            )),
            tokio::spawn(control_loop(manager, commands_rx, root.clone())),
        ];

        info!(host = %backend.ip, ssl = backend.ssl, "Connecting to backend");
        client.start(&backend.ip, backend.ssl, &backend.token);

        Ok(Self {
            client,
            dispatcher,
            root,
            tasks,
        })
    }

    /// The dispatcher applications subscribe through
    pub fn dispatcher(&self) -> SharedEventDispatcher {
        self.dispatcher.clone()
    }

    /// Root cancellation token; cancelling it stops the daemon's loops
    pub fn cancel_token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Resolves once the daemon has been asked to shut down
    pub async fn cancelled(&self) {
        self.root.cancelled().await;
    }

    /// Cancel everything, disconnect, and wait for the loops to finish
    #[instrument(skip(self))]
    pub async fn stop(self) {
        self.root.cancel();
        self.client.stop();

        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Daemon task ended abnormally: {}", e);
            }
        }
        info!("Daemon stopped");
    }
}

async fn receive_loop(
    mut events: mpsc::Receiver<HassEvent>,
    dispatcher: SharedEventDispatcher,
    commands: mpsc::Sender<DaemonCommand>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => dispatcher.dispatch(event, &commands, &cancel).await,
                None => {
                    warn!("Backend event stream closed");
                    break;
                }
            },
        }
    }
    debug!("Receive loop stopped");
}

async fn control_loop(
    mut manager: AppManager,
    mut commands: mpsc::Receiver<DaemonCommand>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            Some(command) = commands.recv() => manager.handle(command),
        }
    }
    if manager.is_running() {
        manager.stop_applications();
    }
    debug!("Control loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ha_core::HassClient;
    use ha_state_store::StateStore;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_event_stream_can_only_be_taken_once() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(StateStore::new());
        let _events = store.take_event_stream();

        let result = ApplicationDaemon::start_with_config(
            dir.path().to_path_buf(),
            DaemonConfig::default(),
            store,
            AppRegistry::new(),
        );
        assert!(matches!(result, Err(DaemonError::EventStreamTaken)));
    }

    #[tokio::test]
    async fn test_stop_disconnects_and_joins() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(StateStore::new());

        let daemon = ApplicationDaemon::start_with_config(
            dir.path().to_path_buf(),
            DaemonConfig::default(),
            store.clone(),
            AppRegistry::new(),
        )
        .unwrap();
        assert!(store.is_connected());

        let token = daemon.cancel_token();
        tokio::time::timeout(Duration::from_secs(5), daemon.stop())
            .await
            .unwrap();
        assert!(token.is_cancelled());
        assert!(!store.is_connected());
    }
}
