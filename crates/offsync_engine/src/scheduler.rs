//! Background drain triggers.

use crate::engine::SyncEngine;
use crate::transport::SyncTransport;
use offsync_storage::DurableStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Shortest accepted timer period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Drives [`SyncEngine::drain`] from a timer and from connectivity edges.
///
/// - every `sync_interval`, drains if online and auto-sync is enabled
/// - on an offline to online transition, drains once if auto-sync is enabled
///   and the queue is not empty
///
/// Both triggers go through the engine's single-flight guard, so overlapping
/// triggers collapse into one pass.
#[derive(Debug)]
pub struct Scheduler;

impl Scheduler {
    /// Spawns the scheduler on the current tokio runtime.
    pub fn spawn<T, S>(engine: Arc<SyncEngine<T, S>>) -> SchedulerHandle
    where
        T: SyncTransport + 'static,
        S: DurableStore + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        // Subscribe before the task first runs so no reconnect is missed.
        let reconnects = engine.connectivity().subscribe_reconnects();
        let task = tokio::spawn(run(engine, reconnects, shutdown_rx));
        SchedulerHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

async fn run<T, S>(
    engine: Arc<SyncEngine<T, S>>,
    mut reconnects: watch::Receiver<u64>,
    mut shutdown: oneshot::Receiver<()>,
) where
    T: SyncTransport + 'static,
    S: DurableStore + 'static,
{
    let period = engine.config().sync_interval.max(MIN_INTERVAL);
    info!(?period, "sync scheduler started");

    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = interval.tick() => {
                if engine.auto_sync() && engine.is_online() {
                    let report = engine.drain().await;
                    debug!(%report, "scheduled drain");
                }
            }
            changed = reconnects.changed() => {
                if changed.is_err() {
                    break;
                }
                let count = *reconnects.borrow_and_update();
                if engine.auto_sync() && !engine.is_queue_empty() {
                    let report = engine.drain().await;
                    info!(reconnects = count, %report, "drain after reconnect");
                }
            }
        }
    }

    info!("sync scheduler stopped");
}

/// Handle to a running [`Scheduler`]. Dropping it aborts the task.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stops the scheduler, letting a running pass finish first.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "sync scheduler task failed");
                }
            }
        }
    }

    /// Returns true once the scheduler task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
