//! Locally owned inbound port.

use crate::codec::{self, Frame};
use crate::registry::Registry;
use rtsub_common::consts::MAX_DATAGRAM_SIZE;
use rtsub_common::message::Message;
use rtsub_common::port::PortName;
use rtsub_common::transport::{InboundChannel, TransportResult};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Smallest read timeout handed to the socket (zero means "block forever").
const MIN_SOCKET_TIMEOUT: Duration = Duration::from_millis(1);

/// Inbound UDP port registered in the naming registry.
///
/// Dropping the channel removes its registry entry.
pub struct UdpChannel {
    name: PortName,
    socket: UdpSocket,
    registry: Arc<Registry>,
    buf: Box<[u8]>,
    socket_timeout: Option<Duration>,
    dropped: u64,
}

impl UdpChannel {
    pub(crate) fn new(name: PortName, socket: UdpSocket, registry: Arc<Registry>) -> Self {
        Self {
            name,
            socket,
            registry,
            buf: vec![0u8; MAX_DATAGRAM_SIZE].into_boxed_slice(),
            socket_timeout: None,
            dropped: 0,
        }
    }

    /// Address data frames must be sent to.
    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Datagrams discarded because they were not valid data frames.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn set_socket_timeout(&mut self, timeout: Option<Duration>) -> TransportResult<()> {
        if self.socket_timeout != timeout {
            self.socket.set_read_timeout(timeout)?;
            self.socket_timeout = timeout;
        }
        Ok(())
    }

    /// Receive one datagram; `None` on timeout or a non-data datagram.
    fn recv_frame(&mut self) -> TransportResult<Option<Message>> {
        let (len, from) = match self.socket.recv_from(&mut self.buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Ok(None);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match codec::decode(&self.buf[..len]) {
            Ok(Frame::Data(msg)) => Ok(Some(msg)),
            Ok(other) => {
                debug!("{}: ignoring non-data frame from {from}: {other:?}", self.name);
                self.dropped += 1;
                Ok(None)
            }
            Err(e) => {
                debug!("{}: dropping {len}-byte datagram from {from}: {e}", self.name);
                self.dropped += 1;
                Ok(None)
            }
        }
    }
}

impl InboundChannel for UdpChannel {
    fn name(&self) -> &PortName {
        &self.name
    }

    fn read(&mut self) -> TransportResult<Message> {
        self.set_socket_timeout(None)?;
        loop {
            if let Some(msg) = self.recv_frame()? {
                return Ok(msg);
            }
        }
    }

    fn read_timeout(&mut self, timeout: Duration) -> TransportResult<Option<Message>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            self.set_socket_timeout(Some(remaining.max(MIN_SOCKET_TIMEOUT)))?;
            if let Some(msg) = self.recv_frame()? {
                return Ok(Some(msg));
            }
        }
    }
}

impl Drop for UdpChannel {
    fn drop(&mut self) {
        match self.registry.unregister(&self.name) {
            Ok(_) => debug!("Closed channel {}", self.name),
            Err(e) => warn!("Failed to unregister {}: {e}", self.name),
        }
    }
}
