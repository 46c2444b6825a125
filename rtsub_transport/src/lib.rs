//! # rtsub Transport
//!
//! Naming service and best-effort UDP carrier behind the
//! [`Transport`](rtsub_common::transport::Transport) contract.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐  Connect/Ack   ┌──────────────┐
//! │  UdpNetwork  ├───────────────►│  Publisher   │
//! │  (connect)   │◄───────────────┤ control thr. │
//! └──────┬───────┘                └──────┬───────┘
//!        │ lookup / register             │ Data frames
//!        ▼                               ▼
//! ┌──────────────┐                ┌──────────────┐
//! │   Registry   │                │  UdpChannel  │
//! │ (dir of JSON)│◄───register────┤  (read loop) │
//! └──────────────┘                └──────────────┘
//! ```
//!
//! - [`registry`] - one JSON entry per port name, stale-owner reclaim
//! - [`codec`] - `RTSB` magic + bincode frames
//! - [`channel`] - locally owned inbound port
//! - [`network`] - process-wide network scope, implements `Transport`
//! - [`publisher`] - outbound port with subscriber fan-out
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rtsub_common::prelude::*;
//! use rtsub_transport::{Publisher, UdpNetwork};
//!
//! # fn main() -> Result<(), TransportError> {
//! let mut net = UdpNetwork::init(&NetworkConfig::default())?;
//! let local = PortName::new("/receiver")?;
//! let remote = PortName::new("/pub/topic:o")?;
//!
//! let mut publisher = Publisher::open(&net, &remote)?;
//! let mut channel = net.open(&local)?;
//! net.connect(&remote, &local, Carrier::Udp)?;
//!
//! publisher.publish(b"A".to_vec())?;
//! let msg = channel.read()?;
//! assert_eq!(msg.payload, b"A");
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod codec;
pub mod network;
pub mod platform;
pub mod publisher;
pub mod registry;

pub use channel::UdpChannel;
pub use network::UdpNetwork;
pub use publisher::Publisher;
pub use registry::{PortEntry, PortRole, Registry};
