//! Receiver process configuration.
//!
//! The `rtsub_receiver` binary reads one TOML file with the sections
//! `[shared]`, `[scheduling]`, `[network]` and `[subscription]`.

pub mod config;
