//! # rtsub Receiver Library
//!
//! A real-time subscriber: the process raises itself to a fixed-priority
//! scheduling class, opens a named inbound port, asks the network to route
//! a remote publisher to it, and consumes messages until told to stop.
//!
//! ## Startup Sequence
//!
//! 1. **ConfiguringSchedule**: `SCHED_FIFO` at a quarter of the platform
//!    maximum, applied once. Failure aborts before any network activity.
//! 2. **OpeningChannel**: register the local port in the naming registry.
//! 3. **Connecting**: Connect/Ack handshake with the remote publisher.
//! 4. **Receiving**: block for each message and hand it to the consumer
//!    hook, until the shutdown flag is raised.
//!
//! Each step's failure maps to its own [`ReceiverError`] variant and exit
//! code. The scheduler and transport are traits, so the whole sequence runs
//! against scripted collaborators in tests.

pub mod error;
pub mod runner;
pub mod sched;
pub mod state;
pub mod subscription;

pub use error::ReceiverError;
pub use runner::Runner;
pub use sched::{PosixScheduler, ScheduleProfile, configure_realtime_priority};
pub use state::{ReceiverEvent, ReceiverState, ReceiverStateMachine, TransitionResult};
pub use subscription::{
    Incoming, ReceiveSummary, ReceiveTiming, connect, open_local_channel, receive_forever,
};
