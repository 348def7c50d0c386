//! Mirror task storage trait.

use async_trait::async_trait;
use thiserror::Error;

use super::{MirrorTask, MirrorTaskStatus, NewMirrorTask};

/// Error type for task store operations.
#[derive(Debug, Error)]
pub enum TaskStoreError {
    /// No task matched the query.
    #[error("mirror task not found")]
    NotFound,

    /// The requested status transition is not allowed.
    #[error("status {status} does not allow {event}")]
    InvalidTransition { status: String, event: String },

    /// Underlying database error.
    #[error("database error: {0}")]
    Database(String),
}

/// Trait for mirror task storage backends.
#[async_trait]
pub trait MirrorTaskStore: Send + Sync {
    /// Persist a new task.
    async fn create(&self, task: NewMirrorTask) -> Result<MirrorTask, TaskStoreError>;

    /// Update an existing task.
    async fn update(&self, task: &MirrorTask) -> Result<(), TaskStoreError>;

    /// Fetch a task by its id.
    async fn find_by_id(&self, id: i64) -> Result<MirrorTask, TaskStoreError>;

    /// Fetch the current task for a mirror.
    async fn find_by_mirror_id(&self, mirror_id: i64) -> Result<MirrorTask, TaskStoreError>;

    /// Select the highest-priority task whose status is in `statuses` and
    /// claim it by advancing the status machine, atomically. Returns
    /// `NotFound` when nothing is dispatchable.
    async fn find_highest_priority_by_status(
        &self,
        statuses: &[MirrorTaskStatus],
    ) -> Result<MirrorTask, TaskStoreError>;

    /// Move every task with status `from` to status `to`, returning the
    /// number of tasks changed. Used for crash recovery at startup.
    async fn reset_status(
        &self,
        from: MirrorTaskStatus,
        to: MirrorTaskStatus,
    ) -> Result<u64, TaskStoreError>;

    /// List tasks in the given statuses ordered by priority (desc), paged.
    async fn list_by_status_with_priority(
        &self,
        statuses: &[MirrorTaskStatus],
        per: i64,
        page: i64,
    ) -> Result<Vec<MirrorTask>, TaskStoreError>;
}
