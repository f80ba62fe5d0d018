// Used by the forkat binary.
use {dirs_next as _, humantime as _, seahorse as _};

// Used by tests
#[cfg(test)]
use {libc as _, proptest as _};

#[macro_use]
extern crate tracing;

pub mod log;
pub mod registry;
pub mod report;

use std::io;
use std::time::Duration;

use anyhow::Context as _;

use crate::registry::{ChildRecord, SpawnRegistry};
use crate::report::BranchReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Leave children running; no synchronization after the split.
    None,
    /// Reap each child, blocking until it terminates.
    Block,
    /// Reap each child, giving up after the given duration.
    Timeout(Duration),
}

#[derive(Debug)]
pub struct SplitCfg {
    pub count: usize,
    pub wait_mode: WaitMode,
}

/// Which side of the split the caller ended up on.
#[derive(Debug)]
pub enum SplitOutcome {
    /// The original process; owns the registry of spawned children.
    Parent { registry: SpawnRegistry },
    /// A newly created process. Its report has been written; the caller must
    /// exit without re-entering the spawn loop.
    Child,
}

/// Duplicates the current process `cfg.count` times.
///
/// Every resulting process writes exactly one report line to `out`: each
/// child its own PID, the parent one line per child with both PIDs. On
/// duplication failure the fixed failure line is written and the error is
/// returned; children spawned so far are left as they are.
pub fn split(cfg: SplitCfg, out: &mut impl io::Write) -> anyhow::Result<SplitOutcome> {
    info!("Start split action");
    debug!(?cfg);

    let mut registry = SpawnRegistry::new();

    for ordinal in 0..cfg.count {
        // SAFETY: forkat is single-threaded and its logging writers are
        // thread-free, so both continuations keep a working process.
        let outcome = unsafe { fork_point::duplicate() };

        let child = match outcome {
            Ok(fork_point::Duplication::Child) => {
                let report = BranchReport::Child {
                    pid: fork_point::current_pid().as_raw(),
                };
                report.write_line(&mut *out).context("couldn't write child report")?;
                out.flush().context("couldn't flush child report")?;

                debug!(parent = %fork_point::parent_pid(), "Running in the child continuation");

                return Ok(SplitOutcome::Child);
            }
            Ok(fork_point::Duplication::Parent { child }) => child,
            Err(error) => {
                BranchReport::Failure
                    .write_line(&mut *out)
                    .context("couldn't write failure report")?;
                out.flush().context("couldn't flush failure report")?;

                return Err(error).context("process duplication failed");
            }
        };

        debug!(%child, ordinal, "Created child process");

        if !registry.insert(child.as_raw(), ChildRecord::new(ordinal)) {
            warn!(%child, "PID already registered; keeping the existing record");
        }

        let report = BranchReport::Parent {
            pid: fork_point::current_pid().as_raw(),
            child: child.as_raw(),
        };
        report.write_line(&mut *out).context("couldn't write parent report")?;
        out.flush().context("couldn't flush parent report")?;

        reap(&mut registry, child, cfg.wait_mode)?;
    }

    info!(children = registry.len(), "Split action done");

    Ok(SplitOutcome::Parent { registry })
}

fn reap(registry: &mut SpawnRegistry, child: fork_point::Pid, mode: WaitMode) -> anyhow::Result<()> {
    let status = match mode {
        WaitMode::None => return Ok(()),
        WaitMode::Block => Some(fork_point::wait(child).context("couldn't wait on child")?),
        WaitMode::Timeout(limit) => fork_point::wait_timeout(child, limit).context("couldn't wait on child")?,
    };

    match status {
        Some(status) => {
            info!(%child, ?status, "Child terminated");
            registry.record_exit(child.as_raw(), status);
        }
        None => warn!(%child, "Child still running after wait timeout"),
    }

    Ok(())
}
