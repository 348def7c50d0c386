//! Outer management component consumed by the HTTP layer.

use std::sync::Arc;

use tracing::{info, warn};

use crate::manager::{ManagerError, SyncWorkerManager};
use crate::syncer::SlotId;
use crate::task::{MirrorTaskStatus, MirrorTaskStore};

use super::types::{TaskList, TaskSummary};

/// Statuses shown as "waiting": persisted work not yet bound to a slot.
const WAITING_STATUSES: &[MirrorTaskStatus] = &[
    MirrorTaskStatus::Queued,
    MirrorTaskStatus::RepoSyncFinished,
];

/// Façade over the worker manager and the task store for operator
/// actions: manual re-sync, cancellation and task listing.
pub struct MirrorSyncComponent {
    manager: Arc<SyncWorkerManager>,
    task_store: Arc<dyn MirrorTaskStore>,
}

impl MirrorSyncComponent {
    pub fn new(manager: Arc<SyncWorkerManager>, task_store: Arc<dyn MirrorTaskStore>) -> Self {
        Self {
            manager,
            task_store,
        }
    }

    /// Re-sync a mirror immediately on the given worker slot.
    ///
    /// Marks the mirror's task claimed in the store (so the dispatcher
    /// cannot race it), then hands it to the manager's priority queue.
    /// Reports success as soon as the request is accepted; the actual
    /// dispatch is asynchronous and its failure is only logged.
    pub async fn sync_now(&self, worker_id: SlotId, mirror_id: i64) -> Result<(), ManagerError> {
        let mut task = self.task_store.find_by_mirror_id(mirror_id).await?;

        task.status = MirrorTaskStatus::LfsSyncStart;
        task.progress = 0;
        task.error_message = None;
        self.task_store.update(&task).await?;

        info!(mirror_id, task_id = task.id, worker_id, "manual re-sync requested");
        let handle = self.manager.rerun(worker_id, task);
        tokio::spawn(async move {
            if let Err(e) = handle.enqueued().await {
                warn!(mirror_id, error = %e, "manual re-sync was not enqueued");
            }
        });
        Ok(())
    }

    /// Cancel the running sync for a mirror. `Ok(true)` when a worker was
    /// cancelled; `MirrorNotRunning` when nothing is running for it.
    pub fn cancel(&self, mirror_id: i64) -> Result<bool, ManagerError> {
        let cancelled = self.manager.stop_worker_by_mirror_id(mirror_id)?;
        Ok(cancelled > 0)
    }

    /// Stop the worker bound to a specific slot.
    pub fn stop_worker(&self, slot_id: SlotId) -> Result<(), ManagerError> {
        self.manager.stop_worker(slot_id)
    }

    /// Active work plus queued-but-undispatched tasks, ordered by
    /// priority.
    pub async fn list_tasks(&self, per: i64, page: i64) -> Result<TaskList, ManagerError> {
        let running = self
            .manager
            .running_tasks()
            .into_iter()
            .map(|(slot_id, task)| (slot_id, TaskSummary::from(task)))
            .collect();

        let waiting = self
            .task_store
            .list_by_status_with_priority(WAITING_STATUSES, per, page)
            .await?
            .into_iter()
            .map(TaskSummary::from)
            .collect();

        Ok(TaskList { running, waiting })
    }
}
