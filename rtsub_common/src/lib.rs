//! rtsub Common Library
//!
//! Shared constants, configuration loading and the collaborator traits used
//! by every crate in the rtsub workspace.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Workspace-wide limits and defaults
//! - [`port`] - Port names and carriers
//! - [`message`] - The opaque message container moved by the transport
//! - [`sched`] - OS scheduler contract (`Scheduler` trait)
//! - [`transport`] - Pub/sub transport contract (`Transport`, `InboundChannel`)
//! - [`receiver`] - Receiver process configuration
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use rtsub_common::prelude::*;
//!
//! let name = PortName::new("/receiver").unwrap();
//! assert_eq!(name.as_str(), "/receiver");
//! ```

pub mod config;
pub mod consts;
pub mod message;
pub mod port;
pub mod prelude;
pub mod receiver;
pub mod sched;
pub mod transport;
