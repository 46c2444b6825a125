//! System-wide constants for the rtsub workspace.
//!
//! Single source of truth for numeric limits and default names.
//! Imported by all crates; do not duplicate these values elsewhere.

/// Default local inbound port name.
pub const DEFAULT_LOCAL_PORT: &str = "/receiver";

/// Default remote port the receiver subscribes to.
pub const DEFAULT_REMOTE_PORT: &str = "/coman/left_arm/state:o";

/// Default naming registry directory.
pub const DEFAULT_REGISTRY_DIR: &str = "/tmp/rtsub/registry";

/// Default receiver configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rtsub/receiver.toml";

/// Maximum length of a port name in bytes.
pub const MAX_PORT_NAME_LEN: usize = 255;

/// Largest UDP payload accepted or produced by the carrier.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// The requested RT priority is `max_priority / PRIORITY_DIVISOR`.
pub const PRIORITY_DIVISOR: i32 = 4;

/// Default receive poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default silence period before a stalled subscription is reported.
pub const DEFAULT_STALL_WARN_AFTER_MS: u64 = 5_000;

/// Default time to wait for a publisher to acknowledge a connect request.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(PRIORITY_DIVISOR > 0);
        assert!(DEFAULT_POLL_INTERVAL_MS > 0);
        assert!(DEFAULT_STALL_WARN_AFTER_MS >= DEFAULT_POLL_INTERVAL_MS);
        assert!(MAX_DATAGRAM_SIZE <= u16::MAX as usize);
    }

    #[test]
    fn default_names_fit_limit() {
        assert!(DEFAULT_LOCAL_PORT.len() <= MAX_PORT_NAME_LEN);
        assert!(DEFAULT_REMOTE_PORT.len() <= MAX_PORT_NAME_LEN);
    }
}
