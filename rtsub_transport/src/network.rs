//! Process-wide network scope.
//!
//! `UdpNetwork` is initialised once before any port is opened and held for
//! the lifetime of the process. It owns the registry handle and implements
//! the [`Transport`] contract: `open()` registers an inbound port and
//! `connect()` performs the Connect/Ack handshake with a publisher.

use crate::channel::UdpChannel;
use crate::codec::{self, Frame};
use crate::registry::{PortEntry, PortRole, Registry};
use rtsub_common::port::{Carrier, PortName};
use rtsub_common::transport::config::NetworkConfig;
use rtsub_common::transport::{Transport, TransportError, TransportResult};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Handshake replies are small; this bounds the receive buffer.
const CONTROL_BUF_SIZE: usize = 2048;

/// Network scope: registry access plus socket settings.
pub struct UdpNetwork {
    config: NetworkConfig,
    registry: Arc<Registry>,
}

impl UdpNetwork {
    /// Initialise the network layer.
    ///
    /// # Errors
    /// `RegistryUnavailable` if the registry directory cannot be created.
    pub fn init(config: &NetworkConfig) -> TransportResult<Self> {
        let registry = Registry::open(&config.registry_dir)?;
        info!(
            "Network initialised (registry={}, bind={})",
            config.registry_dir.display(),
            config.bind_address
        );
        Ok(Self {
            config: config.clone(),
            registry: Arc::new(registry),
        })
    }

    /// Shared registry handle.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Settings this network was initialised with.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Bind a fresh socket on the configured address.
    pub(crate) fn bind(&self) -> TransportResult<UdpSocket> {
        Ok(UdpSocket::bind(SocketAddr::new(self.config.bind_address, 0))?)
    }

    /// Wait for the publisher's answer to a Connect request.
    fn await_reply(
        &self,
        socket: &UdpSocket,
        remote: &PortName,
        local: &PortName,
    ) -> TransportResult<()> {
        let timeout = self.config.connect_timeout();
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; CONTROL_BUF_SIZE];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::NoResponse {
                    remote: remote.clone(),
                    timeout_ms: self.config.connect_timeout_ms,
                });
            }
            socket.set_read_timeout(Some(remaining))?;

            let (len, from) = match socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            match codec::decode(&buf[..len]) {
                Ok(Frame::Ack { subscriber }) if &subscriber == local => return Ok(()),
                Ok(Frame::Nack { subscriber, reason }) if &subscriber == local => {
                    return Err(TransportError::Rejected {
                        remote: remote.clone(),
                        reason,
                    });
                }
                Ok(other) => debug!("Ignoring unexpected reply from {from}: {other:?}"),
                Err(e) => debug!("Ignoring undecodable reply from {from}: {e}"),
            }
        }
    }
}

impl Transport for UdpNetwork {
    type Channel = UdpChannel;

    fn open(&mut self, name: &PortName) -> TransportResult<UdpChannel> {
        let socket = self.bind()?;
        let addr = socket.local_addr()?;
        self.registry
            .register(&PortEntry::owned(name.clone(), PortRole::Subscriber, addr))?;
        info!("Opened port {name} at {addr}");
        Ok(UdpChannel::new(name.clone(), socket, Arc::clone(&self.registry)))
    }

    fn connect(
        &mut self,
        remote: &PortName,
        local: &PortName,
        carrier: Carrier,
    ) -> TransportResult<()> {
        let local_entry = self.registry.lookup(local)?;
        let remote_entry = self.registry.lookup(remote)?;
        if remote_entry.role != PortRole::Publisher {
            return Err(TransportError::Rejected {
                remote: remote.clone(),
                reason: format!("{remote} is a {:?} port, not a publisher", remote_entry.role),
            });
        }

        let socket = self.bind()?;
        let request = codec::encode(&Frame::Connect {
            subscriber: local.clone(),
            data_addr: local_entry.data_addr,
            carrier,
        })?;
        socket.send_to(&request, remote_entry.data_addr)?;
        debug!(
            "Sent connect {remote} -> {local} ({carrier}) to {}",
            remote_entry.data_addr
        );

        match self.await_reply(&socket, remote, local) {
            Ok(()) => {
                info!("Connected {remote} -> {local} over {carrier}");
                Ok(())
            }
            Err(e) => {
                warn!("Connect {remote} -> {local} failed: {e}");
                Err(e)
            }
        }
    }
}

impl Drop for UdpNetwork {
    fn drop(&mut self) {
        info!(
            "Network shut down (registry={})",
            self.registry.dir().display()
        );
    }
}
