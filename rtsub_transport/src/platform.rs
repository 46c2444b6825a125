//! Process liveness checks used to reclaim stale registry entries.

use nix::sys::signal::kill;
use nix::unistd::{Pid, getpid};

/// Whether a process with `pid` currently exists.
///
/// Uses the null signal; a process we may not signal still counts as alive.
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(nix::Error::ESRCH) => false,
        Err(nix::Error::EPERM) => true,
        Err(_) => false,
    }
}

/// PID of the calling process.
pub fn current_pid() -> u32 {
    getpid().as_raw() as u32
}
