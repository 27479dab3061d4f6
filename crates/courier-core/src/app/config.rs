//! EndpointConfig - Endpoint の設定
//!
//! JSON か環境変数（`COURIER_*`）から読み込めます。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 3_000;

pub const ENV_ID: &str = "COURIER_ID";
pub const ENV_ADDRESS: &str = "COURIER_ADDRESS";
pub const ENV_PREFIX: &str = "COURIER_PREFIX";
pub const ENV_SECRET: &str = "COURIER_SECRET";
pub const ENV_TIMEOUT_MS: &str = "COURIER_TIMEOUT_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Endpoint identity. Empty means "generate one".
    pub id: String,
    /// Transport address handed to the connector.
    pub address: String,
    /// Namespace prefix for logical topics.
    pub prefix: String,
    /// Shared secret appended to wire topics and used as the queue group.
    pub secret: String,
    pub default_timeout_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            address: String::new(),
            prefix: String::new(),
            secret: String::new(),
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl EndpointConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read `COURIER_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Build from key/value pairs; unknown keys are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::default();
        for (key, value) in vars {
            let value = value.into();
            match key.as_ref() {
                ENV_ID => config.id = value,
                ENV_ADDRESS => config.address = value,
                ENV_PREFIX => config.prefix = value,
                ENV_SECRET => config.secret = value,
                ENV_TIMEOUT_MS => {
                    config.default_timeout_ms = value.trim().parse().map_err(|_| {
                        ConfigError::InvalidValue {
                            key: ENV_TIMEOUT_MS,
                            value: value.clone(),
                        }
                    })?;
                }
                _ => {}
            }
        }
        Ok(config)
    }
}
