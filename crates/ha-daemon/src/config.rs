//! Startup configuration
//!
//! Reads `go-daemon.yaml`, overlays the supervisor add-on options when the
//! backend host is `hassio`, and fills in the access token from the
//! environment when the file leaves it empty.

use std::env;
use std::path::Path;

use ha_config::{DaemonConfig, HassioOptions};
use tracing::{info, instrument, warn};

use crate::DaemonResult;

/// Environment variable holding the supervisor-issued token
pub const HASSIO_TOKEN_VAR: &str = "HASSIO_TOKEN";

/// Configuration ready for [`ApplicationDaemon`](crate::ApplicationDaemon)
#[derive(Debug, Clone, Default)]
pub struct StartupConfig {
    pub daemon: DaemonConfig,
    /// Log filter requested by the add-on options, if any
    pub log_filter: Option<&'static str>,
}

/// Load the configuration of a config directory
///
/// Only a missing or unparseable `go-daemon.yaml` is an error. Unreadable
/// add-on options are logged and ignored.
#[instrument(skip_all, fields(config_dir = ?config_dir.as_ref()))]
pub fn load_config(
    config_dir: impl AsRef<Path>,
    options_path: impl AsRef<Path>,
) -> DaemonResult<StartupConfig> {
    let mut daemon = DaemonConfig::load(config_dir.as_ref())?;
    let mut log_filter = None;

    if daemon.is_hassio() {
        match HassioOptions::load(options_path.as_ref()) {
            Ok(options) => {
                options.apply_to(&mut daemon);
                log_filter = options.log_filter();
                info!(people = daemon.people.len(), "Applied add-on options");
            }
            Err(e) => warn!("Ignoring add-on options: {}", e),
        }
    }

    if daemon.home_assistant.token.is_empty() {
        daemon.home_assistant.token = env::var(HASSIO_TOKEN_VAR).unwrap_or_default();
        if daemon.home_assistant.token.is_empty() {
            warn!(
                "No access token configured and {} is not set",
                HASSIO_TOKEN_VAR
            );
        }
    }

    Ok(StartupConfig { daemon, log_filter })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ha_config::{ConfigError, CONFIG_FILE};
    use std::fs;
    use tempfile::TempDir;

    fn config_dir(content: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), content).unwrap();
        dir
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = load_config(dir.path(), dir.path().join("options.json")).unwrap_err();
        assert!(matches!(
            err,
            crate::DaemonError::Config(ConfigError::ReadFile { .. })
        ));
    }

    #[test]
    fn test_plain_config() {
        let dir = config_dir(
            r#"
home_assistant:
  ip: 192.168.1.10:8123
  ssl: false
  token: abc
people:
  fred:
    friendly_name: Fred
    devices: [device_tracker.phone]
"#,
        );

        let loaded = load_config(dir.path(), dir.path().join("options.json")).unwrap();
        assert_eq!(loaded.daemon.home_assistant.token, "abc");
        assert!(loaded.daemon.has_people());
        assert_eq!(loaded.log_filter, None);
    }

    #[test]
    fn test_hassio_options_replace_people() {
        let dir = config_dir(
            r#"
home_assistant:
  ip: hassio
  token: abc
people:
  fred:
    devices: [device_tracker.phone]
"#,
        );
        let options = dir.path().join("options.json");
        fs::write(
            &options,
            serde_json::json!({
                "log_level": "warning",
                "persons": [{"id": "wilma", "friendly_name": "Wilma", "devices": ["device_tracker.w"]}]
            })
            .to_string(),
        )
        .unwrap();

        let loaded = load_config(dir.path(), &options).unwrap();
        assert_eq!(loaded.log_filter, Some("warn"));
        assert!(loaded.daemon.people.contains_key("wilma"));
        assert!(!loaded.daemon.people.contains_key("fred"));
    }

    #[test]
    fn test_unreadable_hassio_options_are_ignored() {
        let dir = config_dir(
            r#"
home_assistant:
  ip: hassio
  token: abc
people:
  fred:
    devices: [device_tracker.phone]
"#,
        );

        let loaded = load_config(dir.path(), dir.path().join("missing.json")).unwrap();
        assert!(loaded.daemon.people.contains_key("fred"));
    }
}
