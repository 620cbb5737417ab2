//! Configuration loading
//!
//! Layers, later wins: built-in defaults, the config file (YAML, TOML or
//! JSON by extension), then `XCOM_` environment variables with `__` as the
//! nesting separator (`XCOM_SESSION__DST_ADDR=101`).

use common::LoggingConfig;
use errors::{XcomError, XcomResult};
use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use xcom_protocol::DEVICE_DST_ADDR;

use crate::transport::TransportSettings;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "XCOM_";

/// Addressing and timing shared by every exchange of a client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Our address on the Xcom bus
    pub src_addr: u32,
    /// Default destination (100 = any inverter)
    pub dst_addr: u32,
    /// Overall budget for one exchange, in milliseconds
    pub exchange_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            src_addr: 1,
            dst_addr: DEVICE_DST_ADDR,
            exchange_timeout_ms: 10_000,
        }
    }
}

impl SessionConfig {
    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_millis(self.exchange_timeout_ms)
    }

    pub fn validate(&self) -> XcomResult<()> {
        if self.exchange_timeout_ms == 0 {
            return Err(XcomError::config(
                "Exchange timeout must be greater than zero",
            ));
        }
        if self.src_addr == self.dst_addr {
            return Err(XcomError::config(
                "Source and destination addresses must differ",
            ));
        }
        Ok(())
    }
}

/// Complete client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct XcomConfig {
    pub transport: TransportSettings,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

impl XcomConfig {
    /// Load from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> XcomResult<Self> {
        let figment = Self::figment(path)?.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::extract(&figment)
    }

    /// File layer only; callers merge further providers on top
    pub fn figment(path: Option<&Path>) -> XcomResult<Figment> {
        let figment = Figment::new();
        let Some(path) = path else {
            return Ok(figment);
        };

        if !path.exists() {
            return Err(XcomError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        debug!("Loading configuration from {}", path.display());

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        match extension {
            "json" => Ok(figment.merge(Json::file(path))),
            "toml" => Ok(figment.merge(Toml::file(path))),
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(XcomError::config(format!(
                "Unsupported config format: {extension}"
            ))),
        }
    }

    /// Extract and validate
    pub fn extract(figment: &Figment) -> XcomResult<Self> {
        let config: XcomConfig = figment
            .extract()
            .map_err(|e| XcomError::config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> XcomResult<()> {
        self.transport.validate()?;
        self.session.validate()?;
        self.logging
            .validate()
            .map_err(|e| XcomError::config(format!("{e:#}")))?;
        Ok(())
    }
}
