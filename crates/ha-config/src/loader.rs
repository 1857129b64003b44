//! YAML loader with `!secret` and `!env_var` tag support

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// File holding the values for `!secret` tags
pub const SECRETS_FILE: &str = "secrets.yaml";

/// YAML loader resolving the daemon's custom tags
///
/// - `!secret key` - substitute the value of `key` from `secrets.yaml`
/// - `!env_var VAR` - substitute the environment variable `VAR`
///
/// Other tags are dropped and their inner value kept.
pub struct YamlLoader {
    /// Base directory for relative paths and `secrets.yaml`
    config_dir: PathBuf,
    /// Loaded on first `!secret`
    secrets: Option<HashMap<String, String>>,
}

impl YamlLoader {
    /// Create a new YAML loader for the given config directory
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets: None,
        }
    }

    /// Load and process a YAML file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve_path(path.as_ref());
        debug!("Loading YAML file: {:?}", path);

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.load_str(&content, &path)
    }

    /// Load and process YAML from a string
    pub fn load_str(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.process_value(value)
    }

    fn process_value(&mut self, value: Value) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => {
                let tag = tagged.tag.to_string();
                trace!("Processing tag '{}'", tag);
                match tag.as_str() {
                    "!secret" => self.process_secret(tagged.value),
                    "!env_var" => process_env_var(tagged.value),
                    _ => self.process_value(tagged.value),
                }
            }
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    result.insert(k, self.process_value(v)?);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.process_value(v))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            _ => Ok(value),
        }
    }

    fn process_secret(&mut self, value: Value) -> ConfigResult<Value> {
        let Value::String(key) = value else {
            return Err(ConfigError::InvalidValue {
                key: "!secret".to_string(),
                reason: "secret key must be a string".to_string(),
            });
        };

        if self.secrets.is_none() {
            self.secrets = Some(load_secrets(&self.config_dir)?);
        }

        let secret = self
            .secrets
            .as_ref()
            .and_then(|secrets| secrets.get(&key))
            .ok_or_else(|| ConfigError::SecretNotFound { key: key.clone() })?;

        debug!("Substituted secret: {}", key);
        Ok(Value::String(secret.clone()))
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    /// Get the config directory
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

fn process_env_var(value: Value) -> ConfigResult<Value> {
    let Value::String(var) = value else {
        return Err(ConfigError::InvalidValue {
            key: "!env_var".to_string(),
            reason: "environment variable name must be a string".to_string(),
        });
    };

    let env_value =
        std::env::var(&var).map_err(|_| ConfigError::EnvVarNotFound { var: var.clone() })?;

    debug!("Substituted env var: {}", var);
    Ok(Value::String(env_value))
}

/// Read `secrets.yaml`; a missing file means no secrets
fn load_secrets(config_dir: &Path) -> ConfigResult<HashMap<String, String>> {
    let path = config_dir.join(SECRETS_FILE);
    if !path.exists() {
        debug!("No secrets file at {:?}", path);
        return Ok(HashMap::new());
    }

    let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
        path: path.clone(),
        source: e,
    })?;
    let raw: HashMap<String, Value> =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseYaml {
            path: path.clone(),
            source: e,
        })?;

    Ok(raw
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

/// Load a YAML file relative to a config directory, resolving tags
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new(config_dir).load_file(file)
}

/// Load YAML from a string, resolving tags against a config directory
pub fn load_yaml_str(
    config_dir: impl Into<PathBuf>,
    content: &str,
    source_name: &str,
) -> ConfigResult<Value> {
    YamlLoader::new(config_dir).load_str(content, Path::new(source_name))
}
