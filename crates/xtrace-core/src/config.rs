use crate::endpoint::Endpoint;
use crate::error::ConfigError;
use crate::sampling::SamplingRate;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_NAME: &str = "XTRACE_NAME";
pub const ENV_DAEMON_ADDRESS: &str = "XTRACE_DAEMON_ADDRESS";
pub const ENV_SAMPLING_RATE: &str = "XTRACE_SAMPLING_RATE";
pub const ENV_ENABLED: &str = "XTRACE_ENABLED";

/// Process-level tracing configuration. Set once at startup and shared
/// read-only (`Arc<Config>`) by the tracer and client.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Service name recorded on root segments. Required before tracing starts.
    pub name: Option<String>,

    /// Collector address, `host:port`.
    pub daemon: Endpoint,

    /// Used when the inbound header carries no explicit `Sampled=0|1`.
    pub sampling_rate: SamplingRate,

    /// When false, work still runs but no segment is sent.
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: None,
            daemon: Endpoint::default(),
            sampling_rate: SamplingRate::default(),
            enabled: true,
        }
    }
}

impl Config {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Defaults overridden by `XTRACE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Check the settings a tracer relies on. A disabled config never sends,
    /// so its collector address is not checked.
    pub fn validate(&self) -> Result<(), ConfigError> {
        SamplingRate::new(self.sampling_rate.get())?;
        if matches!(self.name.as_deref(), Some(n) if n.trim().is_empty()) {
            return Err(ConfigError::EmptyName);
        }
        if !self.enabled {
            return Ok(());
        }
        if self.daemon.host().is_empty() || self.daemon.port() == 0 {
            return Err(ConfigError::InvalidEndpoint(self.daemon.to_string()));
        }
        Ok(())
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(name) = lookup(ENV_NAME).filter(|v| !v.is_empty()) {
            self.name = Some(name);
        }
        if let Some(addr) = lookup(ENV_DAEMON_ADDRESS).filter(|v| !v.is_empty()) {
            self.daemon = addr.parse()?;
        }
        if let Some(raw) = lookup(ENV_SAMPLING_RATE).filter(|v| !v.is_empty()) {
            let rate = raw.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_SAMPLING_RATE,
                value: raw.clone(),
            })?;
            self.sampling_rate = SamplingRate::new(rate)?;
        }
        if let Some(raw) = lookup(ENV_ENABLED).filter(|v| !v.is_empty()) {
            self.enabled = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: ENV_ENABLED,
                        value: raw,
                    })
                }
            };
        }
        Ok(())
    }
}
