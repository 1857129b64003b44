//! Supervisor add-on options
//!
//! When the daemon runs as an add-on, the supervisor writes the user's
//! options as JSON. People and tracking settings found there take
//! precedence over the YAML configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::daemon_config::{DaemonConfig, PersonConfig, TrackingSettings};
use crate::error::{ConfigError, ConfigResult};

/// Where the supervisor places the add-on options
pub const DEFAULT_OPTIONS_PATH: &str = "/data/options.json";

/// Contents of the add-on `options.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HassioOptions {
    /// `trace`, `debug`, `info`, `warning`, `error` or `fatal`
    #[serde(default)]
    pub log_level: String,

    #[serde(default)]
    pub tracking: Option<HassioTracking>,

    #[serde(default)]
    pub persons: Vec<HassioPerson>,
}

/// Tracking block of the add-on options
///
/// Keys left out take the tracking defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HassioTracking {
    pub just_arrived_time: u64,
    pub just_left_time: u64,
    pub home_state: String,
    pub just_left_state: String,
    pub just_arrived_state: String,
    pub away_state: String,
}

/// A person entry of the add-on options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HassioPerson {
    pub id: String,
    #[serde(default)]
    pub friendly_name: String,
    #[serde(default)]
    pub devices: Vec<String>,
}

impl HassioOptions {
    /// Read and parse an options file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!("Loading add-on options: {:?}", path);

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::ParseJson {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Replace the people (and tracking, when given) of a daemon config
    pub fn apply_to(&self, config: &mut DaemonConfig) {
        config.people = self
            .persons
            .iter()
            .map(|person| {
                (
                    person.id.clone(),
                    PersonConfig {
                        friendly_name: person.friendly_name.clone(),
                        devices: person.devices.clone(),
                        state: None,
                        attributes: HashMap::new(),
                    },
                )
            })
            .collect();

        if let Some(tracking) = &self.tracking {
            let unit = config.settings.tracking.distance_unit;
            config.settings.tracking = TrackingSettings {
                distance_unit: unit,
                ..tracking.clone().into()
            };
        }
    }

    /// Log level as a `tracing` filter directive, if one was chosen
    pub fn log_filter(&self) -> Option<&'static str> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Some("trace"),
            "debug" => Some("debug"),
            "info" => Some("info"),
            "warning" | "warn" => Some("warn"),
            "error" | "fatal" => Some("error"),
            _ => None,
        }
    }
}

impl From<HassioTracking> for TrackingSettings {
    fn from(tracking: HassioTracking) -> Self {
        Self {
            just_arrived_time: tracking.just_arrived_time,
            just_left_time: tracking.just_left_time,
            home_state: tracking.home_state,
            away_state: tracking.away_state,
            just_arrived_state: tracking.just_arrived_state,
            just_left_state: tracking.just_left_state,
            ..Self::default()
        }
    }
}

impl Default for HassioTracking {
    fn default() -> Self {
        let settings = TrackingSettings::default();
        Self {
            just_arrived_time: settings.just_arrived_time,
            just_left_time: settings.just_left_time,
            home_state: settings.home_state,
            just_left_state: settings.just_left_state,
            just_arrived_state: settings.just_arrived_state,
            away_state: settings.away_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DistanceUnit;
    use tempfile::TempDir;

    const OPTIONS: &str = r#"{
        "log_level": "warning",
        "tracking": {
            "just_arrived_time": 300,
            "just_left_time": 60,
            "home_state": "Home",
            "just_left_state": "Just left",
            "just_arrived_state": "Just arrived",
            "away_state": "Away"
        },
        "persons": [
            {
                "id": "fred",
                "friendly_name": "Fred",
                "devices": ["device_tracker.a", "device_tracker.b", "binary_sensor.c"]
            },
            {
                "id": "wilma",
                "friendly_name": "Wilma",
                "devices": ["device_tracker.d"]
            }
        ]
    }"#;

    fn write_options(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("options.json");
        fs::write(&path, OPTIONS).unwrap();
        path
    }

    #[test]
    fn test_parse_options() {
        let dir = TempDir::new().unwrap();
        let options = HassioOptions::load(write_options(&dir)).unwrap();

        assert_eq!(options.persons.len(), 2);
        assert_eq!(options.persons[0].devices.len(), 3);

        let tracking = options.tracking.as_ref().unwrap();
        assert_eq!(tracking.just_arrived_time, 300);
        assert_eq!(tracking.just_left_time, 60);
        assert_eq!(tracking.home_state, "Home");
        assert_eq!(tracking.away_state, "Away");
        assert_eq!(tracking.just_arrived_state, "Just arrived");
        assert_eq!(tracking.just_left_state, "Just left");
        assert_eq!(options.log_filter(), Some("warn"));
    }

    #[test]
    fn test_apply_replaces_people_and_tracking() {
        let dir = TempDir::new().unwrap();
        let options = HassioOptions::load(write_options(&dir)).unwrap();

        let mut config = DaemonConfig::default();
        config
            .people
            .insert("barney".into(), PersonConfig::default());
        config.settings.tracking.distance_unit = DistanceUnit::Miles;

        options.apply_to(&mut config);

        assert_eq!(config.people.len(), 2);
        assert!(!config.people.contains_key("barney"));
        assert_eq!(config.people["fred"].friendly_name, "Fred");
        assert_eq!(config.settings.tracking.just_left_time, 60);
        assert_eq!(config.settings.tracking.distance_unit, DistanceUnit::Miles);
    }

    #[test]
    fn test_apply_without_tracking_keeps_settings() {
        let options = HassioOptions {
            log_level: String::new(),
            tracking: None,
            persons: vec![],
        };
        let mut config = DaemonConfig::default();
        config.settings.tracking.home_state = "here".into();

        options.apply_to(&mut config);

        assert!(config.people.is_empty());
        assert_eq!(config.settings.tracking.home_state, "here");
        assert_eq!(options.log_filter(), None);
    }

    #[test]
    fn test_partial_tracking_block_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("options.json");
        fs::write(
            &path,
            r#"{
                "tracking": { "just_left_time": 45 },
                "persons": [{ "id": "fred", "devices": ["device_tracker.a"] }]
            }"#,
        )
        .unwrap();

        let options = HassioOptions::load(&path).unwrap();
        let mut config = DaemonConfig::default();
        options.apply_to(&mut config);

        let defaults = TrackingSettings::default();
        assert_eq!(config.people["fred"].devices, vec!["device_tracker.a"]);
        assert_eq!(config.settings.tracking.just_left_time, 45);
        assert_eq!(
            config.settings.tracking.just_arrived_time,
            defaults.just_arrived_time
        );
        assert_eq!(config.settings.tracking.home_state, defaults.home_state);
        assert_eq!(
            config.settings.tracking.just_left_state,
            defaults.just_left_state
        );
    }

    #[test]
    fn test_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("options.json");
        fs::write(&path, "{ not json").unwrap();

        let result = HassioOptions::load(&path);
        assert!(matches!(result, Err(ConfigError::ParseJson { .. })));
    }
}
