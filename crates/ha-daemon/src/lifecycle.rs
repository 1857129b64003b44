//! Application lifecycle
//!
//! Loads every configured application when the backend connects and tears
//! them all down when it disconnects. Runs only on the control loop, so a
//! load and an unload never overlap.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ha_app::{AppRegistry, DaemonApplication, SharedHelper};
use ha_components::{PresenceApp, PRESENCE_APP};
use ha_config::{discover_app_files, load_app_configs, AppConfig, DaemonConfig};
use ha_event_bus::{DaemonCommand, SharedEventDispatcher};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::helper::{SessionHelper, SharedClient};

/// An initialized application instance
struct RunningApp {
    name: String,
    app: Box<dyn DaemonApplication>,
}

/// Starts and stops the configured applications
pub struct AppManager {
    config_dir: PathBuf,
    config: Arc<DaemonConfig>,
    registry: AppRegistry,
    client: SharedClient,
    dispatcher: SharedEventDispatcher,
    root: CancellationToken,
    session: Option<CancellationToken>,
    apps: Vec<RunningApp>,
}

impl AppManager {
    pub fn new(
        config_dir: impl Into<PathBuf>,
        config: Arc<DaemonConfig>,
        registry: AppRegistry,
        client: SharedClient,
        dispatcher: SharedEventDispatcher,
        root: CancellationToken,
    ) -> Self {
        Self {
            config_dir: config_dir.into(),
            config,
            registry,
            client,
            dispatcher,
            root,
            session: None,
            apps: Vec::new(),
        }
    }

    pub fn handle(&mut self, command: DaemonCommand) {
        match command {
            DaemonCommand::StartApplications => self.start_applications(),
            DaemonCommand::StopApplications => self.stop_applications(),
        }
    }

    /// Load every configured application, restarting if any are running
    #[instrument(skip(self))]
    pub fn start_applications(&mut self) {
        if self.is_running() {
            debug!("Applications already running, restarting");
            self.stop_applications();
        }

        let session = self.root.child_token();
        let helper: SharedHelper = Arc::new(SessionHelper::new(
            self.client.clone(),
            self.dispatcher.clone(),
            self.config.clone(),
            session.clone(),
            self.root.clone(),
        ));
        self.session = Some(session);

        if self.config.has_people() {
            self.initialize(
                PRESENCE_APP,
                Box::new(PresenceApp::new()),
                &helper,
                AppConfig::new(PRESENCE_APP),
            );
        }

        for file in discover_app_files(&self.config_dir) {
            self.load_file(&file, &helper);
        }

        info!(apps = self.apps.len(), "Applications started");
    }

    fn load_file(&mut self, file: &Path, helper: &SharedHelper) {
        let configs = match load_app_configs(file) {
            Ok(configs) => configs,
            Err(e) => {
                error!("Skipping application file: {}", e);
                return;
            }
        };

        for (name, config) in configs {
            let Some(app) = self.registry.create(&config.app) else {
                error!(
                    app = %name,
                    file = ?file,
                    "Unknown application type '{}'", config.app
                );
                continue;
            };
            self.initialize(&name, app, helper, config);
        }
    }

    fn initialize(
        &mut self,
        name: &str,
        mut app: Box<dyn DaemonApplication>,
        helper: &SharedHelper,
        config: AppConfig,
    ) {
        if app.initialize(helper.clone(), config) {
            debug!(app = %name, "Application initialized");
            self.apps.push(RunningApp {
                name: name.to_string(),
                app,
            });
        } else {
            warn!(app = %name, "Application declined to start");
        }
    }

    /// Drop every subscription and cancel every application
    #[instrument(skip(self))]
    pub fn stop_applications(&mut self) {
        self.dispatcher.clear();

        for running in &mut self.apps {
            debug!(app = %running.name, "Cancelling application");
            running.app.cancel();
        }
        if let Some(session) = self.session.take() {
            session.cancel();
        }

        let stopped = self.apps.len();
        self.apps.clear();
        info!(apps = stopped, "Applications stopped");
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Names of the running applications, in load order
    pub fn app_names(&self) -> Vec<&str> {
        self.apps
            .iter()
            .map(|running| running.name.as_str())
            .collect()
    }
}
