//! The reconciliation jobs and their shared contract.

mod auto_assign;
mod stale_orders;
mod status_poll;

pub use auto_assign::AutoAssignJob;
pub use stale_orders::StaleUnpaidCancelJob;
pub use status_poll::StatusPollJob;

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;

/// Outcome counts for one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobReport {
    /// Orders the sweep selected for inspection.
    pub examined: usize,

    /// Orders the sweep changed.
    pub applied: usize,

    /// Orders inspected and deliberately left alone.
    pub skipped: usize,

    /// Orders the sweep tried to change and could not.
    pub failed: usize,
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "examined={} applied={} skipped={} failed={}",
            self.examined, self.applied, self.skipped, self.failed
        )
    }
}

/// A periodic reconciliation sweep.
///
/// Jobs keep no state between runs: each `run_once` re-queries the
/// ledger for matching orders and applies whatever is due now, so a
/// missed or crashed sweep is repaired by the next one.
#[async_trait]
pub trait ReconcileJob: Send + Sync {
    /// Job name used in logs.
    fn name(&self) -> &'static str;

    /// Executes one sweep and reports what it did.
    async fn run_once(&self) -> Result<JobReport>;
}
