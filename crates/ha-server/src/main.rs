//! App daemon
//!
//! Main entry point. Usage: `ha-appdaemon [config dir]` (defaults to the
//! current directory).

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use ha_app::AppRegistry;
use ha_components::{StateLoggerApp, STATE_LOGGER_APP};
use ha_config::DEFAULT_OPTIONS_PATH;
use ha_daemon::{load_config, ApplicationDaemon};
use ha_state_store::StateStore;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter};

/// The applications this binary can run
fn registry() -> Result<AppRegistry> {
    let mut registry = AppRegistry::new();
    registry.register_default::<StateLoggerApp>(STATE_LOGGER_APP)?;
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<()> {
    let from_env = EnvFilter::try_from_default_env().ok();
    let env_overrides = from_env.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(from_env.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let config_dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    info!("Starting app daemon with config dir {:?}", config_dir);

    let config = load_config(&config_dir, DEFAULT_OPTIONS_PATH)
        .with_context(|| format!("Failed to load configuration from {:?}", config_dir))?;

    if let (Some(level), false) = (config.log_filter, env_overrides) {
        if let Err(e) = filter_handle.reload(EnvFilter::new(level)) {
            warn!("Could not apply log level '{}': {}", level, e);
        }
    }

    let registry = registry()?;
    info!(apps = ?registry.names(), "Registered applications");

    // No remote transport is wired; run against the in-memory backend.
    let store = Arc::new(StateStore::new());
    let daemon = ApplicationDaemon::start_with_config(config_dir, config.daemon, store, registry)?;

    info!("App daemon is running");

    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        () = daemon.cancelled() => info!("Shutdown requested"),
    }

    info!("Shutting down...");
    daemon.stop().await;

    Ok(())
}
