//! Thin wrapper around the fork syscall with a tagged continuation result.
//!
//! The raw syscall reports three outcomes through a single signed integer.
//! Here, failure is a regular `Result` error observed by the sole surviving
//! process, and each continuation of a successful call observes either
//! [`Duplication::Child`] or [`Duplication::Parent`].

#[cfg(not(unix))]
compile_error!("fork-point only supports Unix targets");

use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{self, ForkResult};

pub use nix::unistd::Pid;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("process duplication failed")]
    Duplicate(#[source] Errno),
    #[error("wait on child {child} failed")]
    Wait {
        child: Pid,
        #[source]
        source: Errno,
    },
}

/// Continuation observed after a successful duplication.
///
/// Both processes resume from the same call site; the variant tells each one
/// which side of the split it is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplication {
    /// Running in the newly created process.
    Child,
    /// Running in the original process; `child` identifies the new process.
    Parent { child: Pid },
}

/// How a reaped child terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(i32),
    Signaled(i32),
}

/// Duplicates the calling process.
///
/// On success a second, independent process exists. Memory is shared by
/// value as of the call instant: later writes on either side are invisible
/// to the other. On failure no new process exists and the error is observed
/// by the calling process only.
///
/// # Safety
///
/// In a multi-threaded process only the calling thread is duplicated, so the
/// child must restrict itself to async-signal-safe operations until it execs
/// or exits. Call this before spawning threads; async runtimes and
/// background logging workers count as threads.
pub unsafe fn duplicate() -> Result<Duplication, Error> {
    // SAFETY: forwarded to the caller (see the function contract).
    let res = unsafe { unistd::fork() };

    match res {
        Ok(ForkResult::Child) => Ok(Duplication::Child),
        Ok(ForkResult::Parent { child }) => Ok(Duplication::Parent { child }),
        Err(errno) => Err(Error::Duplicate(errno)),
    }
}

/// Identifier of the calling process.
pub fn current_pid() -> Pid {
    unistd::getpid()
}

/// Identifier of the calling process's parent.
pub fn parent_pid() -> Pid {
    unistd::getppid()
}

/// Blocks until `child` terminates.
pub fn wait(child: Pid) -> Result<ExitStatus, Error> {
    loop {
        match waitpid(child, None) {
            Ok(status) => {
                if let Some(exit) = terminal_status(status) {
                    return Ok(exit);
                }
                // Stopped or continued: the child is still alive.
            }
            Err(Errno::EINTR) => {}
            Err(source) => return Err(Error::Wait { child, source }),
        }
    }
}

/// Polls `child` without blocking; `None` while it is still running.
pub fn try_wait(child: Pid) -> Result<Option<ExitStatus>, Error> {
    match waitpid(child, Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::StillAlive) => Ok(None),
        Ok(status) => Ok(terminal_status(status)),
        Err(source) => Err(Error::Wait { child, source }),
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Waits for `child` up to `limit`; `None` if it is still running on expiry.
pub fn wait_timeout(child: Pid, limit: Duration) -> Result<Option<ExitStatus>, Error> {
    let deadline = Instant::now() + limit;

    loop {
        if let Some(exit) = try_wait(child)? {
            return Ok(Some(exit));
        }

        let remaining = deadline.saturating_duration_since(Instant::now());

        if remaining.is_zero() {
            return Ok(None);
        }

        thread::sleep(POLL_INTERVAL.min(remaining));
    }
}

fn terminal_status(status: WaitStatus) -> Option<ExitStatus> {
    match status {
        WaitStatus::Exited(_, code) => Some(ExitStatus::Exited(code)),
        WaitStatus::Signaled(_, signal, _) => Some(ExitStatus::Signaled(signal as i32)),
        _ => None,
    }
}
