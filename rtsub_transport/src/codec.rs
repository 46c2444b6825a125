//! Wire frames for the UDP carrier.
//!
//! Every datagram is `FRAME_MAGIC` followed by a bincode-encoded [`Frame`].
//! Datagrams without the magic, or that fail to decode, are not rtsub
//! traffic and are dropped by the receiving side.

use bincode::Options;
use rtsub_common::consts::MAX_DATAGRAM_SIZE;
use rtsub_common::message::Message;
use rtsub_common::port::{Carrier, PortName};
use rtsub_common::transport::{TransportError, TransportResult};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Magic bytes at the start of every rtsub datagram: `"RTSB"`.
pub const FRAME_MAGIC: [u8; 4] = *b"RTSB";

/// Bytes available for the encoded frame after the magic.
const FRAME_BODY_LIMIT: u64 = (MAX_DATAGRAM_SIZE - FRAME_MAGIC.len()) as u64;

/// One datagram's worth of protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    /// Published message, publisher → subscriber.
    Data(Message),
    /// Route request, connector → publisher.
    Connect {
        /// Subscriber port that should receive data.
        subscriber: PortName,
        /// Where to send data frames.
        data_addr: SocketAddr,
        /// Requested carrier.
        carrier: Carrier,
    },
    /// Route accepted, publisher → connector.
    Ack {
        /// Subscriber the route was added for.
        subscriber: PortName,
    },
    /// Route refused, publisher → connector.
    Nack {
        /// Subscriber the route was refused for.
        subscriber: PortName,
        /// Human-readable reason.
        reason: String,
    },
}

fn wire() -> impl Options {
    bincode::options().with_limit(FRAME_BODY_LIMIT)
}

/// Encode a frame into a datagram.
///
/// # Errors
/// `Codec` if the encoded frame does not fit in one datagram.
pub fn encode(frame: &Frame) -> TransportResult<Vec<u8>> {
    let body = wire()
        .serialize(frame)
        .map_err(|e| TransportError::Codec(format!("encode: {e}")))?;
    let mut out = Vec::with_capacity(FRAME_MAGIC.len() + body.len());
    out.extend_from_slice(&FRAME_MAGIC);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a datagram into a frame.
///
/// # Errors
/// `Codec` on missing magic or malformed body.
pub fn decode(datagram: &[u8]) -> TransportResult<Frame> {
    let body = datagram
        .strip_prefix(&FRAME_MAGIC[..])
        .ok_or_else(|| TransportError::Codec("missing frame magic".to_string()))?;
    wire()
        .deserialize(body)
        .map_err(|e| TransportError::Codec(format!("decode: {e}")))
}
