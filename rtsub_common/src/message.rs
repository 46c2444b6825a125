//! The message container carried between ports.
//!
//! The payload is opaque to rtsub; only the envelope (source, sequence
//! number, send time) is interpreted, and only for diagnostics.

use crate::port::PortName;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One published message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Port that published the message.
    pub source: PortName,
    /// Publisher-assigned sequence number, starting at 0.
    pub seq: u64,
    /// Wall-clock send time [µs since UNIX epoch].
    pub sent_at_us: u64,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
}

impl Message {
    /// Build a message stamped with the current time.
    pub fn new(source: PortName, seq: u64, payload: Vec<u8>) -> Self {
        Self {
            source,
            seq,
            sent_at_us: now_us(),
            payload,
        }
    }

    /// Age of the message relative to the local clock [µs].
    ///
    /// Saturates at 0 when clocks disagree.
    pub fn age_us(&self) -> u64 {
        now_us().saturating_sub(self.sent_at_us)
    }
}

/// Current wall-clock time in microseconds since the UNIX epoch.
pub fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}
