//! Subscribe-and-consume operations.
//!
//! `open_local_channel` then `connect` then `receive_forever`, strictly in
//! that order. The receive loop polls the channel with `poll_interval` so
//! the shutdown flag is noticed between messages; it has no other exit.

use crate::error::ReceiverError;
use rtsub_common::message::Message;
use rtsub_common::port::{Carrier, PortName};
use rtsub_common::receiver::config::SubscriptionConfig;
use rtsub_common::transport::{InboundChannel, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Register the local inbound port.
///
/// # Errors
/// `ChannelOpenFailed` when the name is taken or the registry is
/// unreachable. Not retried.
pub fn open_local_channel<T: Transport>(
    transport: &mut T,
    name: &PortName,
) -> Result<T::Channel, ReceiverError> {
    transport
        .open(name)
        .map_err(|source| ReceiverError::ChannelOpenFailed {
            name: name.clone(),
            source,
        })
}

/// Route messages published under `remote` to `local`.
///
/// # Errors
/// `ConnectionFailed` when the remote is unknown, refuses, or is silent.
pub fn connect<T: Transport>(
    transport: &mut T,
    remote: &PortName,
    local: &PortName,
    carrier: Carrier,
) -> Result<(), ReceiverError> {
    transport
        .connect(remote, local, carrier)
        .map_err(|source| ReceiverError::ConnectionFailed {
            remote: remote.clone(),
            local: local.clone(),
            source,
        })
}

// ─── Timing & Statistics ────────────────────────────────────────────

/// Receive loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveTiming {
    /// Longest single wait before the shutdown flag is checked again.
    pub poll_interval: Duration,
    /// Silence after which a stall is reported.
    pub stall_warn_after: Duration,
}

impl From<&SubscriptionConfig> for ReceiveTiming {
    fn from(config: &SubscriptionConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            stall_warn_after: config.stall_warn_after(),
        }
    }
}

/// Counters collected by the receive loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveSummary {
    /// Messages handed to the consumer.
    pub received: u64,
    /// Stall periods observed.
    pub stalls: u64,
    /// Sequence number of the last message.
    pub last_seq: Option<u64>,
    /// Highest sequence number seen.
    pub highest_seq: Option<u64>,
    /// Sequence numbers below `highest_seq` that have not arrived.
    pub gaps: u64,
}

impl ReceiveSummary {
    fn record(&mut self, msg: &Message) {
        match self.highest_seq {
            Some(highest) if msg.seq > highest => {
                let missing = msg.seq - highest - 1;
                if missing > 0 {
                    debug!("{}: {missing} message(s) missing before seq {}", msg.source, msg.seq);
                    self.gaps += missing;
                }
                self.highest_seq = Some(msg.seq);
            }
            Some(highest) if msg.seq == highest => {
                debug!("{}: duplicate seq {highest}", msg.source);
            }
            Some(highest) => {
                // A late arrival fills a gap counted earlier.
                debug!("{}: seq {} after {highest} (reordered or duplicated)", msg.source, msg.seq);
                self.gaps = self.gaps.saturating_sub(1);
            }
            None => self.highest_seq = Some(msg.seq),
        }
        self.last_seq = Some(msg.seq);
        self.received += 1;
    }
}

// ─── Incoming ───────────────────────────────────────────────────────

/// Lazy iterator over messages arriving on a channel.
///
/// Yields messages in arrival order. Ends when the shutdown flag is raised
/// (checked before every poll) or after the first channel error, which is
/// yielded as `ReceiveFailed`.
pub struct Incoming<'a, C: InboundChannel> {
    channel: &'a mut C,
    shutdown: &'a AtomicBool,
    timing: ReceiveTiming,
    summary: ReceiveSummary,
    quiet_since: Instant,
    failed: bool,
}

impl<'a, C: InboundChannel> Incoming<'a, C> {
    /// Iterate `channel` until `shutdown` is raised.
    pub fn new(channel: &'a mut C, shutdown: &'a AtomicBool, timing: ReceiveTiming) -> Self {
        Self {
            channel,
            shutdown,
            timing,
            summary: ReceiveSummary::default(),
            quiet_since: Instant::now(),
            failed: false,
        }
    }

    /// Counters so far.
    pub fn summary(&self) -> ReceiveSummary {
        self.summary
    }

    fn check_stall(&mut self) {
        let quiet = self.quiet_since.elapsed();
        if quiet >= self.timing.stall_warn_after {
            self.summary.stalls += 1;
            warn!(
                "{}: no message for {} ms (stall #{})",
                self.channel.name(),
                quiet.as_millis(),
                self.summary.stalls
            );
            self.quiet_since = Instant::now();
        }
    }
}

impl<C: InboundChannel> Iterator for Incoming<'_, C> {
    type Item = Result<Message, ReceiverError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.channel.read_timeout(self.timing.poll_interval) {
                Ok(Some(msg)) => {
                    self.summary.record(&msg);
                    self.quiet_since = Instant::now();
                    return Some(Ok(msg));
                }
                Ok(None) => self.check_stall(),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(ReceiverError::ReceiveFailed(e)));
                }
            }
        }
        None
    }
}

/// Hand every incoming message to `handler` until `shutdown` is raised.
///
/// # Errors
/// `ReceiveFailed` on a channel error; the loop does not continue after it.
pub fn receive_forever<C, H>(
    channel: &mut C,
    shutdown: &AtomicBool,
    timing: ReceiveTiming,
    mut handler: H,
) -> Result<ReceiveSummary, ReceiverError>
where
    C: InboundChannel,
    H: FnMut(Message),
{
    info!(
        "Receiving on {} (poll={}ms, stall warning after {}ms)",
        channel.name(),
        timing.poll_interval.as_millis(),
        timing.stall_warn_after.as_millis()
    );
    let mut incoming = Incoming::new(channel, shutdown, timing);
    for item in incoming.by_ref() {
        handler(item?);
    }
    let summary = incoming.summary();
    info!(
        "Receive loop stopped: received={}, stalls={}, gaps={}, last_seq={:?}",
        summary.received, summary.stalls, summary.gaps, summary.last_seq
    );
    Ok(summary)
}

// ─── Tests ──────────────────────────────────────────────────────────
