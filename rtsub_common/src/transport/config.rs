//! Network configuration (`[network]` section).

use crate::config::ConfigError;
use crate::consts::{DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_REGISTRY_DIR};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Naming registry location and carrier settings.
///
/// # TOML Example
///
/// ```toml
/// [network]
/// registry_dir = "/run/rtsub/registry"
/// bind_address = "127.0.0.1"
/// connect_timeout_ms = 500
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NetworkConfig {
    /// Directory holding one entry per registered port.
    pub registry_dir: PathBuf,
    /// Address local ports bind to (port number is ephemeral).
    pub bind_address: IpAddr,
    /// Time to wait for a publisher to acknowledge a connect [ms].
    pub connect_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            registry_dir: PathBuf::from(DEFAULT_REGISTRY_DIR),
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl NetworkConfig {
    /// Network settings rooted at `registry_dir`, other fields default.
    pub fn with_registry(registry_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry_dir: registry_dir.into(),
            ..Self::default()
        }
    }

    /// Connect acknowledgement timeout.
    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Validate the section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "network.registry_dir cannot be empty".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "network.connect_timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
