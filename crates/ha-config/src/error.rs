//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why a configuration file or value could not be used
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid YAML: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `!secret` names a key missing from `secrets.yaml`
    #[error("no secret named '{key}'")]
    SecretNotFound { key: String },

    /// `!env_var` names an unset variable
    #[error("environment variable '{var}' is not set")]
    EnvVarNotFound { var: String },

    #[error("bad value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}
