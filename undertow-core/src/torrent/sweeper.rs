//! Background idle-eviction worker
//!
//! Sweeps are driven by traffic: each newly added torrent arms a sweep
//! `sweep_delay` later, and adds arriving before it fires are folded into the
//! same pass. An optional fixed interval sweeps on top of that.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::registry::{SweepOutcome, TorrentRegistry};

/// Spawns and owns the sweep task for a registry.
pub struct SweepWorker;

impl SweepWorker {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn(registry: Arc<TorrentRegistry>) -> SweepWorkerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(Self::run(registry, shutdown_rx));

        SweepWorkerHandle {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    async fn run(registry: Arc<TorrentRegistry>, mut shutdown_rx: oneshot::Receiver<()>) {
        let delay = registry.config().sweep_delay();
        let mut interval = registry.config().sweep_interval().map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        let mut armed: Option<Instant> = None;

        debug!(?delay, periodic = interval.is_some(), "Sweep worker started");

        loop {
            let deadline = armed;

            tokio::select! {
                _ = &mut shutdown_rx => break,

                _ = registry.sweep_requested().notified() => {
                    if armed.is_none() {
                        armed = Some(Instant::now() + delay);
                    }
                }

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    armed = None;
                    Self::sweep(&registry, "add").await;
                }

                _ = next_tick(&mut interval) => {
                    Self::sweep(&registry, "interval").await;
                }
            }
        }

        debug!("Sweep worker stopped");
    }

    async fn sweep(registry: &TorrentRegistry, trigger: &'static str) {
        match registry.check_for_expired_torrents().await {
            SweepOutcome::Completed(report) if report.evicted > 0 || report.failed > 0 => {
                info!(
                    trigger,
                    evicted = report.evicted,
                    failed = report.failed,
                    remaining = registry.len(),
                    "Idle sweep completed"
                );
            }
            SweepOutcome::Completed(_) => {}
            SweepOutcome::Skipped => debug!(trigger, "Idle sweep skipped, another pass is running"),
        }
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Stops the sweep worker.
///
/// Dropping the handle also stops the worker, but without waiting for it.
pub struct SweepWorkerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SweepWorkerHandle {
    /// Signals the worker and waits for it to exit. A sweep already in
    /// progress is allowed to finish first.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Sweep worker terminated abnormally");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}
