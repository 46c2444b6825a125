//! Outbound port with subscriber fan-out.
//!
//! A `Publisher` registers its socket as a publisher port and runs one
//! control thread on a clone of that socket. The thread answers `Connect`
//! frames by adding the subscriber to the route table and replying `Ack`.
//! `publish()` sends one `Data` frame to every routed subscriber.
//!
//! Messages published before a subscriber connects are never delivered to
//! it: there is no history.
//!
//! Routes are pruned every `ROUTE_PRUNE_INTERVAL` by the control thread:
//! a route whose subscriber no longer resolves in the registry, or resolves
//! to a different address, is dropped.

use crate::codec::{self, Frame};
use crate::network::UdpNetwork;
use crate::registry::{PortEntry, PortRole, Registry};
use parking_lot::Mutex;
use rtsub_common::message::Message;
use rtsub_common::port::{Carrier, PortName};
use rtsub_common::transport::{TransportError, TransportResult};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Control thread wake-up period for shutdown checks.
const CONTROL_POLL: Duration = Duration::from_millis(50);
const CONTROL_BUF_SIZE: usize = 2048;
/// How often the control thread drops routes to departed subscribers.
const ROUTE_PRUNE_INTERVAL: Duration = Duration::from_millis(250);

/// One subscriber route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Subscriber port name.
    pub subscriber: PortName,
    /// Where data frames go.
    pub data_addr: SocketAddr,
    /// Carrier agreed at connect time.
    pub carrier: Carrier,
}

/// Outbound port.
pub struct Publisher {
    name: PortName,
    socket: UdpSocket,
    routes: Arc<Mutex<Vec<Route>>>,
    limit: Arc<AtomicUsize>,
    registry: Arc<Registry>,
    running: Arc<AtomicBool>,
    control: Option<JoinHandle<()>>,
    next_seq: u64,
}

impl Publisher {
    /// Register `name` as a publisher and start accepting subscribers.
    ///
    /// # Errors
    /// `NameTaken` if a live owner holds the name.
    pub fn open(network: &UdpNetwork, name: &PortName) -> TransportResult<Self> {
        let socket = network.bind()?;
        let addr = socket.local_addr()?;
        let registry = Arc::clone(network.registry());
        registry.register(&PortEntry::owned(name.clone(), PortRole::Publisher, addr))?;

        let control_socket = match socket.try_clone() {
            Ok(s) => s,
            Err(e) => {
                release(&registry, name);
                return Err(e.into());
            }
        };
        let routes = Arc::new(Mutex::new(Vec::new()));
        let limit = Arc::new(AtomicUsize::new(usize::MAX));
        let running = Arc::new(AtomicBool::new(true));

        let control = {
            let table = RouteTable {
                routes: Arc::clone(&routes),
                limit: Arc::clone(&limit),
            };
            let running = Arc::clone(&running);
            let registry = Arc::clone(&registry);
            let name = name.clone();
            thread::Builder::new()
                .name(format!("rtsub-ctl{name}"))
                .spawn(move || control_loop(&name, &control_socket, &table, &registry, &running))
        };
        let control = match control {
            Ok(handle) => handle,
            Err(e) => {
                release(&registry, name);
                return Err(e.into());
            }
        };

        info!("Publisher {name} listening at {addr}");
        Ok(Self {
            name: name.clone(),
            socket,
            routes,
            limit,
            registry,
            running,
            control: Some(control),
            next_seq: 0,
        })
    }

    /// Port name.
    pub fn name(&self) -> &PortName {
        &self.name
    }

    /// Refuse new subscribers once `max` routes exist.
    ///
    /// Existing routes are kept; a known subscriber may still refresh.
    pub fn set_subscriber_limit(&self, max: usize) {
        self.limit.store(max, Ordering::SeqCst);
    }

    /// Current subscriber routes.
    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().clone()
    }

    /// Number of connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.routes.lock().len()
    }

    /// Drop routes whose subscriber has left the registry.
    ///
    /// Returns the number of routes removed. The control thread does this
    /// periodically; calling it directly forces an immediate pass.
    pub fn prune_routes(&self) -> usize {
        RouteTable {
            routes: Arc::clone(&self.routes),
            limit: Arc::clone(&self.limit),
        }
        .prune(&self.name, &self.registry)
    }

    /// Block until at least `count` subscribers are connected.
    ///
    /// Returns `false` if `timeout` expires first.
    pub fn wait_for_subscribers(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.subscriber_count() < count {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    /// Send `payload` to every subscriber.
    ///
    /// Returns the number of subscribers the datagram was handed to. Send
    /// failures to one subscriber are logged and do not stop the fan-out.
    pub fn publish(&mut self, payload: Vec<u8>) -> TransportResult<usize> {
        let msg = Message::new(self.name.clone(), self.next_seq, payload);
        let datagram = codec::encode(&Frame::Data(msg))?;
        self.next_seq += 1;

        let routes = self.routes.lock().clone();
        let mut delivered = 0;
        for route in &routes {
            match self.socket.send_to(&datagram, route.data_addr) {
                Ok(_) => delivered += 1,
                Err(e) => warn!(
                    "{}: send to {} ({}) failed: {e}",
                    self.name, route.subscriber, route.data_addr
                ),
            }
        }
        Ok(delivered)
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.control.take() {
            if handle.join().is_err() {
                warn!("{}: control thread panicked", self.name);
            }
        }
        release(&self.registry, &self.name);
        debug!("Publisher {} closed", self.name);
    }
}

/// Unregister `name`, logging instead of failing.
fn release(registry: &Registry, name: &PortName) {
    if let Err(e) = registry.unregister(name) {
        warn!("Failed to unregister {name}: {e}");
    }
}

/// Route table shared between the publisher and its control thread.
struct RouteTable {
    routes: Arc<Mutex<Vec<Route>>>,
    limit: Arc<AtomicUsize>,
}

impl RouteTable {
    /// Insert or refresh a route; one route per subscriber name.
    fn add(&self, name: &PortName, route: Route) -> Result<(), String> {
        let mut routes = self.routes.lock();
        if let Some(existing) = routes.iter_mut().find(|r| r.subscriber == route.subscriber) {
            info!(
                "{name}: refreshing route to {} ({} -> {})",
                route.subscriber, existing.data_addr, route.data_addr
            );
            *existing = route;
            return Ok(());
        }

        let limit = self.limit.load(Ordering::SeqCst);
        if routes.len() >= limit {
            return Err(format!("subscriber limit ({limit}) reached"));
        }
        info!(
            "{name}: added route to {} at {} over {}",
            route.subscriber, route.data_addr, route.carrier
        );
        routes.push(route);
        Ok(())
    }

    /// Remove routes that no longer match a live subscriber entry.
    ///
    /// Registry reads happen outside the route lock.
    fn prune(&self, name: &PortName, registry: &Registry) -> usize {
        let snapshot = self.routes.lock().clone();
        let stale: Vec<Route> = snapshot
            .into_iter()
            .filter(|route| match registry.lookup(&route.subscriber) {
                Ok(entry) if entry.data_addr == route.data_addr => false,
                Ok(entry) => {
                    info!(
                        "{name}: dropping route to {} ({} moved to {})",
                        route.subscriber, route.data_addr, entry.data_addr
                    );
                    true
                }
                Err(TransportError::UnknownPort { .. }) => {
                    info!("{name}: dropping route to departed {}", route.subscriber);
                    true
                }
                Err(e) => {
                    debug!("{name}: keeping route to {}: {e}", route.subscriber);
                    false
                }
            })
            .collect();
        if stale.is_empty() {
            return 0;
        }

        let mut routes = self.routes.lock();
        let before = routes.len();
        routes.retain(|route| !stale.contains(route));
        before - routes.len()
    }
}

fn control_loop(
    name: &PortName,
    socket: &UdpSocket,
    table: &RouteTable,
    registry: &Registry,
    running: &AtomicBool,
) {
    if let Err(e) = socket.set_read_timeout(Some(CONTROL_POLL)) {
        warn!("{name}: cannot set control timeout, control thread exiting: {e}");
        return;
    }
    let mut buf = [0u8; CONTROL_BUF_SIZE];
    let mut next_prune = Instant::now() + ROUTE_PRUNE_INTERVAL;

    while running.load(Ordering::SeqCst) {
        if Instant::now() >= next_prune {
            table.prune(name, registry);
            next_prune = Instant::now() + ROUTE_PRUNE_INTERVAL;
        }
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
            Err(e) => {
                warn!("{name}: control socket error: {e}");
                continue;
            }
        };

        let reply = match codec::decode(&buf[..len]) {
            Ok(Frame::Connect {
                subscriber,
                data_addr,
                carrier,
            }) => {
                let route = Route {
                    subscriber: subscriber.clone(),
                    data_addr,
                    carrier,
                };
                match table.add(name, route) {
                    Ok(()) => Frame::Ack { subscriber },
                    Err(reason) => {
                        warn!("{name}: refusing {subscriber}: {reason}");
                        Frame::Nack { subscriber, reason }
                    }
                }
            }
            Ok(other) => {
                debug!("{name}: ignoring {other:?} from {from}");
                continue;
            }
            Err(e) => {
                debug!("{name}: dropping datagram from {from}: {e}");
                continue;
            }
        };

        match codec::encode(&reply) {
            Ok(bytes) => {
                if let Err(e) = socket.send_to(&bytes, from) {
                    warn!("{name}: failed to answer {from}: {e}");
                }
            }
            Err(e) => warn!("{name}: failed to encode reply: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(name: &str, port: u16) -> Route {
        Route {
            subscriber: PortName::new(name).unwrap(),
            data_addr: SocketAddr::from(([127, 0, 0, 1], port)),
            carrier: Carrier::Udp,
        }
    }

    fn table(limit: usize) -> RouteTable {
        RouteTable {
            routes: Arc::new(Mutex::new(Vec::new())),
            limit: Arc::new(AtomicUsize::new(limit)),
        }
    }

    #[test]
    fn duplicate_subscriber_refreshes_route() {
        let publisher = PortName::new("/pub").unwrap();
        let table = table(usize::MAX);

        table.add(&publisher, route("/a", 1000)).unwrap();
        table.add(&publisher, route("/b", 1001)).unwrap();
        table.add(&publisher, route("/a", 2000)).unwrap();

        let routes = table.routes.lock();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].data_addr.port(), 2000);
        assert_eq!(routes[1].subscriber.as_str(), "/b");
    }

    #[test]
    fn prune_drops_departed_and_moved_subscribers() {
        let tmp = tempfile::TempDir::new().unwrap();
        let registry = Registry::open(tmp.path()).unwrap();
        let publisher = PortName::new("/pub").unwrap();
        let table = table(usize::MAX);
        for (name, port) in [("/stays", 1000), ("/moved", 1001)] {
            let r = route(name, port);
            registry
                .register(&PortEntry::owned(r.subscriber.clone(), PortRole::Subscriber, r.data_addr))
                .unwrap();
            table.add(&publisher, r).unwrap();
        }
        table.add(&publisher, route("/gone", 1002)).unwrap();
        registry.unregister(&PortName::new("/moved").unwrap()).unwrap();
        registry
            .register(&PortEntry::owned(
                PortName::new("/moved").unwrap(),
                PortRole::Subscriber,
                SocketAddr::from(([127, 0, 0, 1], 2001)),
            ))
            .unwrap();

        assert_eq!(table.prune(&publisher, &registry), 2);
        let routes = table.routes.lock();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].subscriber.as_str(), "/stays");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_release_is_logged() {
        let tmp = tempfile::TempDir::new().unwrap();
        let registry = Registry::open(tmp.path()).unwrap();
        let name = PortName::new("/pub").unwrap();
        // A directory where the entry file should be makes reads fail.
        std::fs::create_dir(tmp.path().join(crate::registry::entry_file_name(&name))).unwrap();

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .without_time()
            .finish();
        tracing::subscriber::with_default(subscriber, || release(&registry, &name));

        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("Failed to unregister /pub"), "logged: {logged}");
    }

    #[test]
    fn limit_refuses_new_but_allows_refresh() {
        let publisher = PortName::new("/pub").unwrap();
        let table = table(1);

        table.add(&publisher, route("/a", 1000)).unwrap();
        let reason = table.add(&publisher, route("/b", 1001)).unwrap_err();
        assert!(reason.contains("limit"));
        table.add(&publisher, route("/a", 3000)).unwrap();
        assert_eq!(table.routes.lock()[0].data_addr.port(), 3000);
    }
}
