//! Configuration loading for the app daemon
//!
//! The daemon reads its configuration from a directory:
//!
//! - `go-daemon.yaml` - backend connection, people and tracking settings
//! - `secrets.yaml` - values referenced with `!secret key`
//! - `app/**/*.yaml` - application descriptors, one mapping per file
//!
//! When running as a supervisor add-on, people and tracking settings come
//! from the add-on's `options.json` instead (see [`HassioOptions`]).
//!
//! # Example
//!
//! ```ignore
//! use ha_config::{DaemonConfig, discover_app_files, load_app_configs};
//!
//! let config = DaemonConfig::load("/config")?;
//! for file in discover_app_files("/config") {
//!     let apps = load_app_configs(&file)?;
//! }
//! ```

mod app_config;
mod daemon_config;
mod error;
mod hassio;
mod loader;

pub use app_config::{discover_app_files, load_app_configs, AppConfig, APP_DIR};
pub use daemon_config::{
    DaemonConfig, DistanceUnit, HomeAssistantConfig, PersonConfig, Settings, TrackingSettings,
    CONFIG_FILE, HASSIO_HOST,
};
pub use error::{ConfigError, ConfigResult};
pub use hassio::{HassioOptions, HassioPerson, HassioTracking, DEFAULT_OPTIONS_PATH};
pub use loader::{load_yaml, load_yaml_str, YamlLoader, SECRETS_FILE};
