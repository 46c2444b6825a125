//! Startup sequence and receive loop, end to end.
//!
//! The network is created by a factory that is only called after the
//! scheduling request succeeded, so a denied request never touches the
//! naming registry.

use crate::error::ReceiverError;
use crate::sched::{ScheduleProfile, configure_realtime_priority};
use crate::state::{ReceiverEvent, ReceiverState, ReceiverStateMachine, TransitionResult};
use crate::subscription::{ReceiveSummary, ReceiveTiming, connect, open_local_channel, receive_forever};
use rtsub_common::message::Message;
use rtsub_common::receiver::config::ReceiverConfig;
use rtsub_common::sched::Scheduler;
use rtsub_common::transport::{Transport, TransportResult};
use std::sync::atomic::AtomicBool;
use tracing::{debug, error, info};

/// Drives one receiver through its lifecycle.
#[derive(Debug, Default)]
pub struct Runner {
    machine: ReceiverStateMachine,
    profile: Option<ScheduleProfile>,
}

impl Runner {
    /// Runner in `Start`.
    pub const fn new() -> Self {
        Self {
            machine: ReceiverStateMachine::new(),
            profile: None,
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> ReceiverState {
        self.machine.state()
    }

    /// Scheduling profile, once applied.
    pub const fn profile(&self) -> Option<ScheduleProfile> {
        self.profile
    }

    /// Configure scheduling, subscribe, and consume until `shutdown`.
    ///
    /// `network` builds the transport; it is invoked only after scheduling
    /// succeeded. The transport outlives the channel opened on it.
    ///
    /// # Errors
    /// The first failing step's `ReceiverError`. The state machine is left
    /// in `Aborted`. The error is returned, not logged; the caller reports
    /// it.
    pub fn run<S, T, F, H>(
        &mut self,
        scheduler: &S,
        config: &ReceiverConfig,
        network: F,
        shutdown: &AtomicBool,
        handler: H,
    ) -> Result<ReceiveSummary, ReceiverError>
    where
        S: Scheduler,
        T: Transport,
        F: FnOnce() -> TransportResult<T>,
        H: FnMut(Message),
    {
        let result = self.run_steps(scheduler, config, network, shutdown, handler);
        match &result {
            Ok(_) => self.advance(ReceiverEvent::ShutdownObserved),
            Err(_) => self.advance(ReceiverEvent::Failed),
        }
        result
    }

    fn run_steps<S, T, F, H>(
        &mut self,
        scheduler: &S,
        config: &ReceiverConfig,
        network: F,
        shutdown: &AtomicBool,
        handler: H,
    ) -> Result<ReceiveSummary, ReceiverError>
    where
        S: Scheduler,
        T: Transport,
        F: FnOnce() -> TransportResult<T>,
        H: FnMut(Message),
    {
        let sub = &config.subscription;

        self.advance(ReceiverEvent::Begin);
        self.profile = Some(configure_realtime_priority(scheduler, &config.scheduling)?);
        self.advance(ReceiverEvent::ScheduleApplied);

        self.advance(ReceiverEvent::OpenRequested);
        let mut transport = network().map_err(|source| ReceiverError::ChannelOpenFailed {
            name: sub.local_port.clone(),
            source,
        })?;
        let mut channel = open_local_channel(&mut transport, &sub.local_port)?;
        self.advance(ReceiverEvent::ChannelOpened);

        self.advance(ReceiverEvent::ConnectRequested);
        connect(&mut transport, &sub.remote_port, &sub.local_port, sub.carrier)?;
        self.advance(ReceiverEvent::ConnectAccepted);
        info!(
            "Subscribed {} -> {} over {}",
            sub.remote_port, sub.local_port, sub.carrier
        );

        self.advance(ReceiverEvent::ReceiveStarted);
        receive_forever(&mut channel, shutdown, ReceiveTiming::from(sub), handler)
    }

    fn advance(&mut self, event: ReceiverEvent) {
        let from = self.machine.state();
        match self.machine.handle_event(event) {
            TransitionResult::Ok(to) => debug!("{from} --{event:?}--> {to}"),
            TransitionResult::Rejected(reason) => {
                error!("Lifecycle bug: {event:?} in {from}: {reason}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtsub_common::sched::{SchedError, SchedPolicy};
    use rtsub_transport::UdpNetwork;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::Level;

    struct DenyingScheduler;

    impl Scheduler for DenyingScheduler {
        fn max_priority(&self, _policy: SchedPolicy) -> Result<i32, SchedError> {
            Ok(80)
        }

        fn min_priority(&self, _policy: SchedPolicy) -> Result<i32, SchedError> {
            Ok(1)
        }

        fn set_scheduler(&self, _policy: SchedPolicy, _priority: i32) -> Result<(), SchedError> {
            Err(SchedError::Os {
                call: "sched_setscheduler",
                source: io::Error::from_raw_os_error(libc::EPERM),
            })
        }

        fn current_policy(&self) -> Result<SchedPolicy, SchedError> {
            Ok(SchedPolicy::Other)
        }

        fn current_priority(&self) -> Result<i32, SchedError> {
            Ok(0)
        }
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failure_is_returned_without_error_log() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::ERROR)
            .with_writer(move || writer.clone())
            .without_time()
            .finish();

        let shutdown = AtomicBool::new(false);
        let mut runner = Runner::new();
        let result = tracing::subscriber::with_default(subscriber, || {
            runner.run(
                &DenyingScheduler,
                &ReceiverConfig::default(),
                || -> TransportResult<UdpNetwork> { unreachable!("network before scheduling") },
                &shutdown,
                |_| {},
            )
        });

        assert!(matches!(result, Err(ReceiverError::SchedulingDenied(_))));
        assert_eq!(runner.state(), ReceiverState::Aborted);
        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logged.is_empty(), "runner logged: {logged}");
    }
}
