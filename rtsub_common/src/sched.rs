//! OS scheduler contract.
//!
//! This module defines:
//! - `SchedPolicy` - Scheduling classes rtsub knows about
//! - `Scheduler` trait - Interface to the process scheduler
//! - `SchedError` enum - Error types for scheduler calls
//!
//! The receiver never calls the OS directly; it goes through a `Scheduler`
//! so tests can substitute a scripted implementation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Scheduling class of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SchedPolicy {
    /// Fixed-priority, run until block or preemption (`SCHED_FIFO`).
    #[default]
    #[serde(rename = "fifo")]
    Fifo,
    /// Fixed-priority with time slicing among equals (`SCHED_RR`).
    #[serde(rename = "rr")]
    RoundRobin,
    /// Time-shared default class (`SCHED_OTHER`). Never requested.
    #[serde(rename = "other")]
    Other,
}

impl SchedPolicy {
    /// Whether this is a fixed-priority real-time class.
    pub const fn is_realtime(self) -> bool {
        matches!(self, Self::Fifo | Self::RoundRobin)
    }
}

impl fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fifo => "SCHED_FIFO",
            Self::RoundRobin => "SCHED_RR",
            Self::Other => "SCHED_OTHER",
        })
    }
}

/// Error types for scheduler operations.
#[derive(Debug, Error)]
pub enum SchedError {
    /// An OS call returned failure.
    #[error("{call} failed: {source}")]
    Os {
        /// Name of the failing call.
        call: &'static str,
        /// errno as reported by the OS.
        #[source]
        source: std::io::Error,
    },

    /// The OS reported a policy this crate does not model.
    #[error("unknown scheduling policy {0}")]
    UnknownPolicy(i32),

    /// The implementation does not provide this operation.
    #[error("{0} is not supported by this scheduler")]
    Unsupported(&'static str),
}

/// Interface to the process scheduler.
///
/// All operations act on the calling process as a whole (pid 0).
///
/// # Call Order
///
/// | Operation | When |
/// |-----------|------|
/// | `max_priority()` / `min_priority()` | before `set_scheduler()` |
/// | `lock_memory()` / `pin_to_cpu()` | optional, before `set_scheduler()` |
/// | `set_scheduler()` | exactly once |
/// | `current_policy()` / `current_priority()` | diagnostics after the attempt |
pub trait Scheduler {
    /// Highest priority valid for `policy`.
    fn max_priority(&self, policy: SchedPolicy) -> Result<i32, SchedError>;

    /// Lowest priority valid for `policy`.
    fn min_priority(&self, policy: SchedPolicy) -> Result<i32, SchedError>;

    /// Apply `policy` at `priority` to the calling process.
    fn set_scheduler(&self, policy: SchedPolicy, priority: i32) -> Result<(), SchedError>;

    /// Policy currently in effect for the calling process.
    fn current_policy(&self) -> Result<SchedPolicy, SchedError>;

    /// Priority currently in effect for the calling process.
    fn current_priority(&self) -> Result<i32, SchedError>;

    /// Lock current and future pages into RAM.
    fn lock_memory(&self) -> Result<(), SchedError> {
        Err(SchedError::Unsupported("lock_memory"))
    }

    /// Restrict the calling process to one CPU core.
    fn pin_to_cpu(&self, _cpu: usize) -> Result<(), SchedError> {
        Err(SchedError::Unsupported("pin_to_cpu"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedScheduler;

    impl Scheduler for FixedScheduler {
        fn max_priority(&self, _policy: SchedPolicy) -> Result<i32, SchedError> {
            Ok(99)
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
            Ok(24)
        }
    }

    #[test]
    fn optional_operations_default_to_unsupported() {
        let sched = FixedScheduler;
        assert!(matches!(
            sched.lock_memory(),
            Err(SchedError::Unsupported("lock_memory"))
        ));
        assert!(matches!(
            sched.pin_to_cpu(0),
            Err(SchedError::Unsupported("pin_to_cpu"))
        ));
    }

    #[test]
    fn realtime_classes() {
        assert!(SchedPolicy::Fifo.is_realtime());
        assert!(SchedPolicy::RoundRobin.is_realtime());
        assert!(!SchedPolicy::Other.is_realtime());
        assert_eq!(SchedPolicy::default(), SchedPolicy::Fifo);
    }

    #[test]
    fn os_error_mentions_call() {
        let err = SchedError::Os {
            call: "sched_setscheduler",
            source: std::io::Error::from_raw_os_error(1),
        };
        assert!(err.to_string().contains("sched_setscheduler"));
    }
}
