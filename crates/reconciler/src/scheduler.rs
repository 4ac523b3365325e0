//! Drives reconciliation jobs on fixed intervals.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::jobs::ReconcileJob;

/// Runs each registered job on its own interval until shut down.
///
/// Every job gets its own task, so a slow provider poll never delays
/// the stale-order sweep. The first tick fires immediately; a tick that
/// lands while the previous sweep is still running is delayed rather
/// than bursted.
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// Spawns a job that runs once per `interval`.
    pub fn spawn(&mut self, job: Arc<dyn ReconcileJob>, interval: Duration) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(
                job = job.name(),
                interval_secs = interval.as_secs(),
                "reconciliation job scheduled"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        metrics::counter!("reconciler_job_runs_total").increment(1);
                        match job.run_once().await {
                            Ok(report) => {
                                tracing::info!(job = job.name(), %report, "reconciliation sweep finished");
                            }
                            Err(e) => {
                                tracing::error!(job = job.name(), error = %e, "reconciliation sweep failed");
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!(job = job.name(), "reconciliation job stopping");
                        break;
                    }
                }
            }
        });
        self.handles.push(handle);
    }

    /// Number of jobs currently scheduled.
    pub fn job_count(&self) -> usize {
        self.handles.len()
    }

    /// Signals every job to stop and waits for the tasks to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
