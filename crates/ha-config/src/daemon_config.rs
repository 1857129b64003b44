//! Main daemon configuration
//!
//! Parses `go-daemon.yaml` from the configuration directory.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::{load_yaml, load_yaml_str};

/// Name of the main configuration file inside the config directory
pub const CONFIG_FILE: &str = "go-daemon.yaml";

/// Backend host value meaning "running as a supervisor add-on"
pub const HASSIO_HOST: &str = "hassio";

/// Top-level daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// How to reach the backend
    #[serde(default)]
    pub home_assistant: HomeAssistantConfig,

    /// People to track, keyed by person id
    #[serde(default)]
    pub people: BTreeMap<String, PersonConfig>,

    /// Optional tuning
    #[serde(default)]
    pub settings: Settings,
}

/// Backend connection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomeAssistantConfig {
    /// Host (and optional port) of the backend, or `hassio`
    #[serde(default)]
    pub ip: String,

    /// Use TLS
    #[serde(default)]
    pub ssl: bool,

    /// Long-lived access token
    #[serde(default)]
    pub token: String,
}

/// One tracked person
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonConfig {
    /// Display name written to the presence entity
    #[serde(default)]
    pub friendly_name: String,

    /// Device entity ids contributing to this person's presence
    #[serde(default)]
    pub devices: Vec<String>,

    /// Presence label to start from
    #[serde(default)]
    pub state: Option<String>,

    /// Attributes to start from
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Optional daemon settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Presence tracking tuning
    #[serde(default)]
    pub tracking: TrackingSettings,
}

/// Presence tracking tuning: labels, debounce windows and distance unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSettings {
    /// Seconds a person stays "just arrived" before settling at home
    #[serde(default = "default_debounce_secs")]
    pub just_arrived_time: u64,

    /// Seconds a person stays "just left" before settling as away
    #[serde(default = "default_debounce_secs")]
    pub just_left_time: u64,

    #[serde(default = "default_home_state")]
    pub home_state: String,

    #[serde(default = "default_away_state")]
    pub away_state: String,

    #[serde(default = "default_just_arrived_state")]
    pub just_arrived_state: String,

    #[serde(default = "default_just_left_state")]
    pub just_left_state: String,

    /// Unit of the computed distance from home
    #[serde(default)]
    pub distance_unit: DistanceUnit,
}

/// Unit for distances reported on presence entities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceUnit {
    #[default]
    #[serde(rename = "K", alias = "km")]
    Kilometers,
    #[serde(rename = "M", alias = "mi")]
    Miles,
    #[serde(rename = "N", alias = "nm")]
    NauticalMiles,
}

fn default_debounce_secs() -> u64 {
    300
}

fn default_home_state() -> String {
    "Home".to_string()
}

fn default_away_state() -> String {
    "Away".to_string()
}

fn default_just_arrived_state() -> String {
    "Just arrived".to_string()
}

fn default_just_left_state() -> String {
    "Just left".to_string()
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            just_arrived_time: default_debounce_secs(),
            just_left_time: default_debounce_secs(),
            home_state: default_home_state(),
            away_state: default_away_state(),
            just_arrived_state: default_just_arrived_state(),
            just_left_state: default_just_left_state(),
            distance_unit: DistanceUnit::default(),
        }
    }
}

impl TrackingSettings {
    /// Debounce window after arriving
    pub fn just_arrived_delay(&self) -> Duration {
        Duration::from_secs(self.just_arrived_time)
    }

    /// Debounce window after leaving
    pub fn just_left_delay(&self) -> Duration {
        Duration::from_secs(self.just_left_time)
    }
}

impl DaemonConfig {
    /// Load the configuration from a config directory
    pub fn load(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let config_dir = config_dir.as_ref();
        let yaml = load_yaml(config_dir, CONFIG_FILE)?;
        Self::from_yaml(yaml)
    }

    /// Parse configuration text, resolving tags against a config directory
    pub fn from_yaml_str(config_dir: impl AsRef<Path>, content: &str) -> ConfigResult<Self> {
        let yaml = load_yaml_str(config_dir.as_ref(), content, CONFIG_FILE)?;
        Self::from_yaml(yaml)
    }

    /// Parse configuration from a YAML value
    pub fn from_yaml(yaml: Value) -> ConfigResult<Self> {
        if yaml.is_null() {
            return Ok(Self::default());
        }

        serde_yaml::from_value(yaml).map_err(|e| ConfigError::InvalidValue {
            key: "root".to_string(),
            reason: e.to_string(),
        })
    }

    /// Whether any person is configured for presence tracking
    pub fn has_people(&self) -> bool {
        !self.people.is_empty()
    }

    /// Whether the daemon runs as a supervisor add-on
    pub fn is_hassio(&self) -> bool {
        self.home_assistant.ip == HASSIO_HOST
    }
}
