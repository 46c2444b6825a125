//! Receiver over the real UDP carrier on localhost.
//!
//! Scheduling is scripted (test hosts rarely grant SCHED_FIFO); the
//! network, registry and publisher are real.

use rtsub_common::prelude::*;
use rtsub_receiver::{ReceiverError, ReceiverState, Runner};
use rtsub_transport::{Publisher, UdpNetwork};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

struct AcceptingScheduler;

impl Scheduler for AcceptingScheduler {
    fn max_priority(&self, _policy: SchedPolicy) -> Result<i32, SchedError> {
        Ok(80)
    }

    fn min_priority(&self, _policy: SchedPolicy) -> Result<i32, SchedError> {
        Ok(1)
    }

    fn set_scheduler(&self, _policy: SchedPolicy, _priority: i32) -> Result<(), SchedError> {
        Ok(())
    }

    fn current_policy(&self) -> Result<SchedPolicy, SchedError> {
        Ok(SchedPolicy::Fifo)
    }

    fn current_priority(&self) -> Result<i32, SchedError> {
        Ok(20)
    }
}

fn config(tmp: &TempDir) -> ReceiverConfig {
    let mut config = ReceiverConfig::default();
    config.network = NetworkConfig::with_registry(tmp.path());
    config.network.connect_timeout_ms = 300;
    config.subscription.local_port = PortName::new("/receiver").unwrap();
    config.subscription.remote_port = PortName::new("/pub/topic:o").unwrap();
    config.subscription.poll_interval_ms = 20;
    config
}

#[test]
fn publisher_to_receiver_in_order() {
    let tmp = TempDir::new().unwrap();
    let config = config(&tmp);
    let net = UdpNetwork::init(&config.network).unwrap();
    let mut publisher = Publisher::open(&net, &config.subscription.remote_port).unwrap();

    let shutdown = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();
    let receiver = {
        let shutdown = Arc::clone(&shutdown);
        let config = config.clone();
        thread::spawn(move || {
            let mut runner = Runner::new();
            let result = runner.run(
                &AcceptingScheduler,
                &config,
                || UdpNetwork::init(&config.network),
                &shutdown,
                |msg| {
                    let _ = tx.send(msg.payload);
                },
            );
            (result, runner.state())
        })
    };

    assert!(publisher.wait_for_subscribers(1, Duration::from_secs(5)));
    for payload in ["A", "B", "C"] {
        publisher.publish(payload.as_bytes().to_vec()).unwrap();
    }

    let mut consumed = Vec::new();
    for _ in 0..3 {
        consumed.push(rx.recv_timeout(Duration::from_secs(2)).unwrap());
    }
    assert_eq!(consumed, vec![b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]);

    // Still waiting for more; nothing else arrives on its own.
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    assert!(!receiver.is_finished());

    shutdown.store(true, Ordering::SeqCst);
    let (result, state) = receiver.join().unwrap();
    let summary = result.unwrap();
    assert_eq!(summary.received, 3);
    assert_eq!(summary.gaps, 0);
    assert_eq!(state, ReceiverState::Stopped);

    // The receiver's port was released on exit.
    let names: Vec<String> = net
        .registry()
        .list()
        .unwrap()
        .into_iter()
        .map(|e| e.name.to_string())
        .collect();
    assert_eq!(names, vec!["/pub/topic:o".to_string()]);
}

#[test]
fn missing_publisher_is_connection_failure() {
    let tmp = TempDir::new().unwrap();
    let config = config(&tmp);
    let shutdown = AtomicBool::new(false);
    let mut runner = Runner::new();

    let err = runner
        .run(
            &AcceptingScheduler,
            &config,
            || UdpNetwork::init(&config.network),
            &shutdown,
            |_| panic!("nothing to receive"),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        ReceiverError::ConnectionFailed {
            source: TransportError::UnknownPort { .. },
            ..
        }
    ));
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn taken_local_name_is_open_failure() {
    let tmp = TempDir::new().unwrap();
    let config = config(&tmp);
    let mut squatter_net = UdpNetwork::init(&config.network).unwrap();
    let _squatter = squatter_net.open(&config.subscription.local_port).unwrap();
    let shutdown = AtomicBool::new(false);
    let mut runner = Runner::new();

    let err = runner
        .run(
            &AcceptingScheduler,
            &config,
            || UdpNetwork::init(&config.network),
            &shutdown,
            |_| {},
        )
        .unwrap_err();

    assert!(matches!(err, ReceiverError::ChannelOpenFailed { .. }));
    assert_eq!(err.exit_code(), 3);
}
