//! Pub/sub transport contract.
//!
//! This module defines:
//! - `Transport` trait - naming service + carrier: open ports, connect them
//! - `InboundChannel` trait - a locally owned port that yields messages
//! - `TransportError` enum - Error types for transport operations
//!
//! The concrete UDP implementation lives in the `rtsub_transport` crate.

pub mod config;

use crate::message::Message;
use crate::port::{Carrier, PortName, PortNameError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Error types for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Port name is already registered by a live owner.
    #[error("port name already registered: {name}")]
    NameTaken {
        /// Contested name.
        name: PortName,
    },

    /// The naming registry cannot be reached or written.
    #[error("naming registry unavailable at {}: {source}", path.display())]
    RegistryUnavailable {
        /// Registry location.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No port with this name is registered.
    #[error("unknown port: {name}")]
    UnknownPort {
        /// Name looked up.
        name: PortName,
    },

    /// The remote side refused the connection.
    #[error("connection to {remote} rejected: {reason}")]
    Rejected {
        /// Remote port.
        remote: PortName,
        /// Reason given by the remote side.
        reason: String,
    },

    /// The remote side did not answer in time.
    #[error("no response from {remote} within {timeout_ms} ms")]
    NoResponse {
        /// Remote port.
        remote: PortName,
        /// Time waited [ms].
        timeout_ms: u64,
    },

    /// A frame or registry entry could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// Invalid port name.
    #[error(transparent)]
    InvalidName(#[from] PortNameError),

    /// Socket or file I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Source I/O error.
        #[from]
        source: std::io::Error,
    },
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// A locally owned inbound port.
///
/// Exclusively owned by one consumer; reads are blocking.
pub trait InboundChannel {
    /// Registered name of this port.
    fn name(&self) -> &PortName;

    /// Block until the next message arrives.
    fn read(&mut self) -> TransportResult<Message>;

    /// Block at most `timeout` for the next message.
    ///
    /// Returns `Ok(None)` when the timeout expires with nothing delivered.
    fn read_timeout(&mut self, timeout: Duration) -> TransportResult<Option<Message>>;
}

/// Naming service and carrier.
///
/// # Lifecycle
///
/// 1. `open()` - register a local inbound port
/// 2. `connect()` - route a remote port's output into a local port
/// 3. read from the returned channel
pub trait Transport {
    /// Channel type produced by `open()`.
    type Channel: InboundChannel;

    /// Register `name` as a local inbound port.
    ///
    /// # Errors
    /// `NameTaken` if a live owner holds the name, `RegistryUnavailable` if
    /// the naming service cannot be reached.
    fn open(&mut self, name: &PortName) -> TransportResult<Self::Channel>;

    /// Route messages published on `remote` to the local port `local`.
    ///
    /// # Errors
    /// `UnknownPort` if either name is unregistered, `Rejected` or
    /// `NoResponse` if the publisher does not accept the route.
    fn connect(&mut self, remote: &PortName, local: &PortName, carrier: Carrier)
    -> TransportResult<()>;
}
