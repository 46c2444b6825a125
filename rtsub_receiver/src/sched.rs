//! Real-time scheduling self-configuration.
//!
//! ## Sequence
//! 1. Optional `mlockall(MCL_CURRENT | MCL_FUTURE)` plus stack prefault.
//! 2. Optional `sched_setaffinity` to one CPU core.
//! 3. `sched_setscheduler(0, policy, max / 4)`, applied once, no retry.
//! 4. Query the effective policy and priority back and log them.
//!
//! Any refusal in steps 1-3 is `SchedulingDenied`. Step 4 is diagnostic
//! only.

use crate::error::ReceiverError;
use nix::sched::{CpuSet, sched_setaffinity};
use nix::sys::mman::{MlockAllFlags, mlockall};
use nix::unistd::Pid;
use rtsub_common::consts::PRIORITY_DIVISOR;
use rtsub_common::receiver::config::SchedulingConfig;
use rtsub_common::sched::{SchedError, SchedPolicy, Scheduler};
use std::io;
use tracing::{debug, info, warn};

/// Scheduling class and priority the process was placed in.
///
/// Created once by [`configure_realtime_priority`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleProfile {
    /// Requested class.
    pub policy: SchedPolicy,
    /// Requested static priority.
    pub priority: i32,
}

/// Priority requested for a class whose platform maximum is `max`.
#[inline]
pub const fn realtime_priority(max: i32) -> i32 {
    max / PRIORITY_DIVISOR
}

/// Place the calling process in the configured real-time class.
///
/// # Errors
/// `SchedulingDenied` if the OS refuses memory locking, CPU pinning or the
/// scheduling change itself.
pub fn configure_realtime_priority(
    scheduler: &impl Scheduler,
    config: &SchedulingConfig,
) -> Result<ScheduleProfile, ReceiverError> {
    if config.lock_memory {
        scheduler.lock_memory()?;
        prefault_stack();
        debug!("Memory locked and stack prefaulted");
    }
    if let Some(cpu) = config.cpu_core {
        scheduler.pin_to_cpu(cpu)?;
        debug!("Pinned to CPU core {cpu}");
    }

    let policy = config.policy;
    let max = scheduler.max_priority(policy)?;
    let min = scheduler.min_priority(policy)?;
    let priority = realtime_priority(max);
    if priority < min {
        warn!("{policy}: max/{PRIORITY_DIVISOR} = {priority} is below the minimum {min}, the OS may refuse it");
    }

    scheduler.set_scheduler(policy, priority)?;

    match (scheduler.current_policy(), scheduler.current_priority()) {
        (Ok(effective), Ok(prio)) => info!(
            "Scheduling: requested {policy} priority {priority} (range {min}..={max}), effective {effective} priority {prio}"
        ),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Scheduling: requested {policy} priority {priority}, cannot read back: {e}")
        }
    }

    Ok(ScheduleProfile { policy, priority })
}

/// Touch 1 MB of stack so later growth does not page-fault.
fn prefault_stack() {
    let mut buf = [0u8; 1024 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, aligned, exclusive reference.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

// ─── POSIX Scheduler ────────────────────────────────────────────────

/// [`Scheduler`] backed by the POSIX scheduling calls of the calling
/// process (pid 0).
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixScheduler;

impl PosixScheduler {
    /// Scheduler for the calling process.
    pub const fn new() -> Self {
        Self
    }
}

const fn raw_policy(policy: SchedPolicy) -> libc::c_int {
    match policy {
        SchedPolicy::Fifo => libc::SCHED_FIFO,
        SchedPolicy::RoundRobin => libc::SCHED_RR,
        SchedPolicy::Other => libc::SCHED_OTHER,
    }
}

fn policy_from_raw(raw: libc::c_int) -> Result<SchedPolicy, SchedError> {
    match raw & !libc::SCHED_RESET_ON_FORK {
        libc::SCHED_FIFO => Ok(SchedPolicy::Fifo),
        libc::SCHED_RR => Ok(SchedPolicy::RoundRobin),
        libc::SCHED_OTHER => Ok(SchedPolicy::Other),
        other => Err(SchedError::UnknownPolicy(other)),
    }
}

fn os_error(call: &'static str) -> SchedError {
    SchedError::Os {
        call,
        source: io::Error::last_os_error(),
    }
}

fn nix_error(call: &'static str, errno: nix::errno::Errno) -> SchedError {
    SchedError::Os {
        call,
        source: io::Error::from(errno),
    }
}

impl Scheduler for PosixScheduler {
    fn max_priority(&self, policy: SchedPolicy) -> Result<i32, SchedError> {
        // SAFETY: plain query, no pointers.
        let max = unsafe { libc::sched_get_priority_max(raw_policy(policy)) };
        if max < 0 {
            return Err(os_error("sched_get_priority_max"));
        }
        Ok(max)
    }

    fn min_priority(&self, policy: SchedPolicy) -> Result<i32, SchedError> {
        // SAFETY: plain query, no pointers.
        let min = unsafe { libc::sched_get_priority_min(raw_policy(policy)) };
        if min < 0 {
            return Err(os_error("sched_get_priority_min"));
        }
        Ok(min)
    }

    fn set_scheduler(&self, policy: SchedPolicy, priority: i32) -> Result<(), SchedError> {
        let param = libc::sched_param {
            sched_priority: priority,
        };
        // SAFETY: `param` outlives the call.
        let ret = unsafe { libc::sched_setscheduler(0, raw_policy(policy), &param) };
        if ret != 0 {
            return Err(os_error("sched_setscheduler"));
        }
        Ok(())
    }

    fn current_policy(&self) -> Result<SchedPolicy, SchedError> {
        // SAFETY: plain query, no pointers.
        let raw = unsafe { libc::sched_getscheduler(0) };
        if raw < 0 {
            return Err(os_error("sched_getscheduler"));
        }
        policy_from_raw(raw)
    }

    fn current_priority(&self) -> Result<i32, SchedError> {
        let mut param = libc::sched_param { sched_priority: 0 };
        // SAFETY: `param` is a valid, writable sched_param.
        let ret = unsafe { libc::sched_getparam(0, &mut param) };
        if ret != 0 {
            return Err(os_error("sched_getparam"));
        }
        Ok(param.sched_priority)
    }

    fn lock_memory(&self) -> Result<(), SchedError> {
        mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE)
            .map_err(|e| nix_error("mlockall", e))
    }

    fn pin_to_cpu(&self, cpu: usize) -> Result<(), SchedError> {
        let mut cpuset = CpuSet::new();
        cpuset.set(cpu).map_err(|e| nix_error("CpuSet::set", e))?;
        sched_setaffinity(Pid::from_raw(0), &cpuset).map_err(|e| nix_error("sched_setaffinity", e))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
