//! In-process counters for door launches.
//!
//! Each CLI session is its own process, so the counters cover one session; the
//! binary logs a [`summary`] when the session ends. Durable per-chain usage lives
//! in the catalog (`Chain::usage`).
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::exec::ExecutionResult;

static LAUNCHES: AtomicU64 = AtomicU64::new(0);
static LAUNCH_FAILURES: AtomicU64 = AtomicU64::new(0);
static NONZERO_EXITS: AtomicU64 = AtomicU64::new(0);
static WAIT_INTERRUPTS: AtomicU64 = AtomicU64::new(0);

/// Count a finished launch attempt by outcome.
pub fn record_launch(result: &ExecutionResult) {
    LAUNCHES.fetch_add(1, Ordering::Relaxed);
    match result {
        Ok(status) if !status.success() => {
            NONZERO_EXITS.fetch_add(1, Ordering::Relaxed);
        }
        Ok(_) => {}
        Err(_) => {
            LAUNCH_FAILURES.fetch_add(1, Ordering::Relaxed);
        }
    }
}

pub fn inc_wait_interrupted() {
    WAIT_INTERRUPTS.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub launches: u64,
    pub launch_failures: u64,
    pub nonzero_exits: u64,
    pub wait_interrupts: u64,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "launches={} failures={} nonzero={} wait_interrupts={}",
            self.launches, self.launch_failures, self.nonzero_exits, self.wait_interrupts
        )
    }
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        launches: LAUNCHES.load(Ordering::Relaxed),
        launch_failures: LAUNCH_FAILURES.load(Ordering::Relaxed),
        nonzero_exits: NONZERO_EXITS.load(Ordering::Relaxed),
        wait_interrupts: WAIT_INTERRUPTS.load(Ordering::Relaxed),
    }
}

/// One-line summary for the end-of-session log record.
pub fn summary() -> String {
    format!("metrics: {}", snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{CommandLineError, RawStatus};

    #[test]
    fn launches_are_counted_by_outcome() {
        // counters are process-wide; compare deltas
        let before = snapshot();
        record_launch(&Ok(RawStatus::from_raw(0)));
        record_launch(&Err(CommandLineError::Empty.into()));
        inc_wait_interrupted();
        let after = snapshot();
        assert!(after.launches >= before.launches + 2);
        assert!(after.launch_failures > before.launch_failures);
        assert!(after.wait_interrupts > before.wait_interrupts);
        assert!(summary().starts_with("metrics: launches="));
    }
}
