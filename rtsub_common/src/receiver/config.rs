//! Configuration structures for the receiver process.
//!
//! All config types use `serde::Deserialize` for TOML loading. Every field
//! has a default so an empty file (or no file) yields a runnable receiver.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{
    DEFAULT_LOCAL_PORT, DEFAULT_POLL_INTERVAL_MS, DEFAULT_REMOTE_PORT,
    DEFAULT_STALL_WARN_AFTER_MS,
};
use crate::port::{Carrier, PortName};
use crate::sched::SchedPolicy;
use crate::transport::config::NetworkConfig;

/// Service name used when `[shared]` is absent.
pub const DEFAULT_SERVICE_NAME: &str = "rtsub-receiver";

// ─── Top-Level Config ───────────────────────────────────────────────

/// Top-level receiver configuration.
///
/// Immutable once the receiver leaves `ConfiguringSchedule`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiverConfig {
    /// Logging and service identity.
    #[serde(default = "default_shared")]
    pub shared: SharedConfig,

    /// Real-time scheduling request.
    #[serde(default)]
    pub scheduling: SchedulingConfig,

    /// Naming registry and carrier.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Which ports to open and connect.
    #[serde(default)]
    pub subscription: SubscriptionConfig,
}

fn default_shared() -> SharedConfig {
    SharedConfig::named(DEFAULT_SERVICE_NAME)
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            shared: default_shared(),
            scheduling: SchedulingConfig::default(),
            network: NetworkConfig::default(),
            subscription: SubscriptionConfig::default(),
        }
    }
}

impl ReceiverConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.scheduling.validate()?;
        self.network.validate()?;
        self.subscription.validate()
    }
}

// ─── [scheduling] ───────────────────────────────────────────────────

/// Real-time scheduling request.
///
/// The priority is not configurable: it is always a quarter of the
/// platform maximum for `policy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SchedulingConfig {
    /// Fixed-priority class to request (`fifo` or `rr`).
    #[serde(default)]
    pub policy: SchedPolicy,

    /// `mlockall(MCL_CURRENT | MCL_FUTURE)` before switching class.
    #[serde(default)]
    pub lock_memory: bool,

    /// Pin the process to this CPU core before switching class.
    #[serde(default)]
    pub cpu_core: Option<usize>,
}

impl SchedulingConfig {
    /// Reject non real-time classes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.policy.is_realtime() {
            return Err(ConfigError::ValidationError(format!(
                "scheduling.policy must be a real-time class, got {}",
                self.policy
            )));
        }
        Ok(())
    }
}

// ─── [subscription] ─────────────────────────────────────────────────

/// Which ports the receiver opens and connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionConfig {
    /// Local inbound port registered by the receiver.
    #[serde(default = "default_local_port")]
    pub local_port: PortName,

    /// Remote port whose output is routed to `local_port`.
    #[serde(default = "default_remote_port")]
    pub remote_port: PortName,

    /// Carrier requested for the route.
    #[serde(default)]
    pub carrier: Carrier,

    /// How often the receive loop checks the shutdown flag [ms].
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Silence after which a stall is reported [ms].
    #[serde(default = "default_stall_warn_after_ms")]
    pub stall_warn_after_ms: u64,
}

// DEFAULT_* port constants are valid names.
fn default_local_port() -> PortName {
    PortName::new(DEFAULT_LOCAL_PORT).expect("default local port is valid")
}
fn default_remote_port() -> PortName {
    PortName::new(DEFAULT_REMOTE_PORT).expect("default remote port is valid")
}
fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_stall_warn_after_ms() -> u64 {
    DEFAULT_STALL_WARN_AFTER_MS
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            local_port: default_local_port(),
            remote_port: default_remote_port(),
            carrier: Carrier::default(),
            poll_interval_ms: default_poll_interval_ms(),
            stall_warn_after_ms: default_stall_warn_after_ms(),
        }
    }
}

impl SubscriptionConfig {
    /// Poll interval of the receive loop.
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Silence threshold for stall reports.
    #[inline]
    pub fn stall_warn_after(&self) -> Duration {
        Duration::from_millis(self.stall_warn_after_ms)
    }

    /// Validate intervals and port names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local_port == self.remote_port {
            return Err(ConfigError::ValidationError(format!(
                "subscription.local_port and remote_port are both {}",
                self.local_port
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "subscription.poll_interval_ms must be > 0".to_string(),
            ));
        }
        if self.stall_warn_after_ms < self.poll_interval_ms {
            return Err(ConfigError::ValidationError(format!(
                "subscription.stall_warn_after_ms ({}) must be >= poll_interval_ms ({})",
                self.stall_warn_after_ms, self.poll_interval_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigLoader, LogLevel};

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = ReceiverConfig::from_toml("").unwrap();
        assert_eq!(cfg.shared.service_name, DEFAULT_SERVICE_NAME);
        assert_eq!(cfg.scheduling.policy, SchedPolicy::Fifo);
        assert_eq!(cfg.subscription.local_port.as_str(), "/receiver");
        assert_eq!(
            cfg.subscription.remote_port.as_str(),
            "/coman/left_arm/state:o"
        );
        assert_eq!(cfg.subscription.carrier, Carrier::Udp);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn full_file_parses() {
        let cfg = ReceiverConfig::from_toml(
            r#"
[shared]
log_level = "debug"
service_name = "arm-listener"

[scheduling]
policy = "rr"
lock_memory = true
cpu_core = 3

[network]
registry_dir = "/run/rtsub"
connect_timeout_ms = 250

[subscription]
local_port = "/listener"
remote_port = "/pub/topic:o"
carrier = "udp"
poll_interval_ms = 20
stall_warn_after_ms = 2000
"#,
        )
        .unwrap();

        assert_eq!(cfg.shared.log_level, LogLevel::Debug);
        assert_eq!(cfg.scheduling.policy, SchedPolicy::RoundRobin);
        assert!(cfg.scheduling.lock_memory);
        assert_eq!(cfg.scheduling.cpu_core, Some(3));
        assert_eq!(cfg.network.connect_timeout_ms, 250);
        assert_eq!(cfg.subscription.remote_port.as_str(), "/pub/topic:o");
        assert_eq!(cfg.subscription.poll_interval(), Duration::from_millis(20));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn other_policy_is_rejected() {
        let cfg = ReceiverConfig::from_toml("[scheduling]\npolicy = \"other\"\n").unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn unknown_carrier_is_a_parse_error() {
        let result = ReceiverConfig::from_toml("[subscription]\ncarrier = \"tcp\"\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn same_local_and_remote_is_rejected() {
        let mut cfg = ReceiverConfig::default();
        cfg.subscription.remote_port = cfg.subscription.local_port.clone();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn stall_threshold_below_poll_is_rejected() {
        let mut cfg = ReceiverConfig::default();
        cfg.subscription.poll_interval_ms = 500;
        cfg.subscription.stall_warn_after_ms = 100;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_section_is_rejected() {
        let result = ReceiverConfig::from_toml("[metrics]\nenabled = true\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
