//! Receiver error type and process exit codes.

use rtsub_common::config::ConfigError;
use rtsub_common::port::PortName;
use rtsub_common::sched::SchedError;
use rtsub_common::transport::TransportError;
use thiserror::Error;

/// Clean shutdown through the shutdown flag.
pub const EXIT_OK: i32 = 0;
/// Configuration or process startup failed.
pub const EXIT_STARTUP: i32 = 1;
/// The OS refused the real-time scheduling request.
pub const EXIT_SCHEDULING_DENIED: i32 = 2;
/// The local port could not be registered.
pub const EXIT_CHANNEL_OPEN_FAILED: i32 = 3;
/// The remote publisher could not be connected.
pub const EXIT_CONNECTION_FAILED: i32 = 4;
/// The channel failed while receiving.
pub const EXIT_RECEIVE_FAILED: i32 = 5;

/// Fatal receiver errors. Every variant ends the process.
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Process setup outside the pipeline (signal handler, logging).
    #[error("startup failed: {0}")]
    Startup(String),

    /// Real-time scheduling request refused.
    #[error("scheduling denied: {0}")]
    SchedulingDenied(#[from] SchedError),

    /// Local port registration failed.
    #[error("cannot open local channel {name}: {source}")]
    ChannelOpenFailed {
        name: PortName,
        #[source]
        source: TransportError,
    },

    /// Remote publisher could not be routed to the local port.
    #[error("cannot connect {remote} -> {local}: {source}")]
    ConnectionFailed {
        remote: PortName,
        local: PortName,
        #[source]
        source: TransportError,
    },

    /// Channel error after the subscription was established.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] TransportError),
}

impl ReceiverError {
    /// Process exit code for this failure kind.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Startup(_) => EXIT_STARTUP,
            Self::SchedulingDenied(_) => EXIT_SCHEDULING_DENIED,
            Self::ChannelOpenFailed { .. } => EXIT_CHANNEL_OPEN_FAILED,
            Self::ConnectionFailed { .. } => EXIT_CONNECTION_FAILED,
            Self::ReceiveFailed(_) => EXIT_RECEIVE_FAILED,
        }
    }
}

impl From<ctrlc::Error> for ReceiverError {
    fn from(e: ctrlc::Error) -> Self {
        Self::Startup(format!("cannot install signal handler: {e}"))
    }
}
