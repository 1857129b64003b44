//! Application descriptors
//!
//! Every YAML file below `<config dir>/app/` holds one or more named
//! descriptors:
//!
//! ```yaml
//! porch_light:
//!   app: state_logger
//!   properties:
//!     entity: light.porch
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::loader::YamlLoader;

/// Directory, relative to the config directory, holding descriptor files
pub const APP_DIR: &str = "app";

/// One application descriptor: type name plus string properties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Registered application type
    pub app: String,

    /// Free-form properties handed to the application
    #[serde(default, deserialize_with = "deserialize_properties")]
    pub properties: HashMap<String, String>,
}

impl AppConfig {
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Look up a property
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Scalars are accepted as properties and kept in their textual form
fn deserialize_properties<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<HashMap<String, Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| {
            let s = match v {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                other => serde_yaml::to_string(&other)
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
            };
            (k, s)
        })
        .collect())
}

/// List every `*.yaml`/`*.yml` file below `<config dir>/app/`, sorted
///
/// A missing or unreadable directory yields no files.
pub fn discover_app_files(config_dir: impl AsRef<Path>) -> Vec<PathBuf> {
    let root = config_dir.as_ref().join(APP_DIR);
    let mut files = Vec::new();
    collect_yaml_files(&root, &mut files);
    files.sort();
    debug!(
        "Found {} application descriptor files in {:?}",
        files.len(),
        root
    );
    files
}

fn collect_yaml_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot read {:?}: {}", dir, e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_yaml_files(&path, files);
        } else if matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        ) {
            files.push(path);
        } else {
            warn!("Ignoring non-YAML file in app directory: {:?}", path);
        }
    }
}

/// Parse one descriptor file into `name -> descriptor`
///
/// Tags are resolved against the config directory containing `app/`.
pub fn load_app_configs(path: impl AsRef<Path>) -> ConfigResult<BTreeMap<String, AppConfig>> {
    let path = path.as_ref();
    let config_dir = config_dir_of(path);
    let value = YamlLoader::new(config_dir).load_file(path)?;

    if value.is_null() {
        return Ok(BTreeMap::new());
    }

    serde_yaml::from_value(value).map_err(|e| ConfigError::InvalidValue {
        key: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn config_dir_of(path: &Path) -> PathBuf {
    path.ancestors()
        .find(|dir| dir.file_name().is_some_and(|name| name == APP_DIR))
        .and_then(Path::parent)
        .or_else(|| path.parent())
        .map(Path::to_path_buf)
        .unwrap_or_default()
}
