//! Dispatcher: feeds dispatchable tasks from the store into the normal
//! work queue.
//!
//! Runs forever, independent of slot availability; the bounded queue push
//! is the backpressure that keeps it at most one task ahead of the pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

use crate::metrics;
use crate::task::{MirrorTask, MirrorTaskStatus, MirrorTaskStore, TaskStoreError};

/// Statuses eligible for dispatch into the LFS-sync worker pool.
pub(crate) const DISPATCHABLE_STATUSES: &[MirrorTaskStatus] =
    &[MirrorTaskStatus::RepoSyncFinished];

pub(crate) struct Dispatcher {
    task_store: Arc<dyn MirrorTaskStore>,
    queue: mpsc::Sender<MirrorTask>,
    retry_delay: Duration,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Dispatcher {
    pub(crate) fn new(
        task_store: Arc<dyn MirrorTaskStore>,
        queue: mpsc::Sender<MirrorTask>,
        retry_delay: Duration,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            task_store,
            queue,
            retry_delay,
            shutdown_rx,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("dispatcher started");
        loop {
            match self
                .task_store
                .find_highest_priority_by_status(DISPATCHABLE_STATUSES)
                .await
            {
                Ok(task) => {
                    debug!(
                        task_id = task.id,
                        mirror_id = task.mirror_id,
                        priority = ?task.priority,
                        "dispatching task"
                    );
                    metrics::DISPATCHED_TASKS.inc();
                    tokio::select! {
                        _ = self.shutdown_rx.recv() => break,
                        sent = self.queue.send(task) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(TaskStoreError::NotFound) => {
                    debug!("no tasks to dispatch");
                    metrics::DISPATCH_RETRIES.with_label_values(&["not_found"]).inc();
                    if self.sleep_or_shutdown().await {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to query dispatchable tasks");
                    metrics::DISPATCH_RETRIES
                        .with_label_values(&["store_error"])
                        .inc();
                    if self.sleep_or_shutdown().await {
                        break;
                    }
                }
            }
        }
        info!("dispatcher stopped");
    }

    /// Returns true when shutdown was signalled during the retry sleep.
    async fn sleep_or_shutdown(&mut self) -> bool {
        tokio::select! {
            _ = self.shutdown_rx.recv() => true,
            _ = tokio::time::sleep(self.retry_delay) => false,
        }
    }
}
