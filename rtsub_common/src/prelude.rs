//! Prelude module for common re-exports.
//!
//! `use rtsub_common::prelude::*;` brings in the types every rtsub crate
//! touches without listing individual paths.

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::receiver::config::{ReceiverConfig, SchedulingConfig, SubscriptionConfig};
pub use crate::transport::config::NetworkConfig;

// ─── Ports & Messages ───────────────────────────────────────────────
pub use crate::message::Message;
pub use crate::port::{Carrier, PortName, PortNameError};

// ─── Collaborators ──────────────────────────────────────────────────
pub use crate::sched::{SchedError, SchedPolicy, Scheduler};
pub use crate::transport::{InboundChannel, Transport, TransportError, TransportResult};
