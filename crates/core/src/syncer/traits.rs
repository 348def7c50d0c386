//! Sync worker traits.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::task::MirrorTask;

/// Identifier of a worker slot (1..=worker_count).
pub type SlotId = usize;

/// Errors produced by sync workers and their factory.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The run observed its cancellation signal and stopped.
    #[error("sync cancelled")]
    Cancelled,

    /// Failed to construct a worker for a slot.
    #[error("worker creation failed: {0}")]
    WorkerCreation(String),

    /// The LFS batch API rejected the request or returned no objects.
    #[error("lfs batch request failed: {0}")]
    Batch(String),

    /// Transport-level failure talking to the upstream.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Downloaded content did not match the pointer's oid or size.
    #[error("integrity check failed for {oid}: {reason}")]
    Integrity { oid: String, reason: String },

    /// The task payload could not be interpreted.
    #[error("invalid task payload: {0}")]
    InvalidPayload(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task store error: {0}")]
    Store(#[from] crate::task::TaskStoreError),
}

/// A worker that performs the actual synchronization for one task.
///
/// `run` blocks until the sync finishes, fails, or observes the
/// cancellation signal. The worker owns the task's terminal status: it
/// applies the outcome to the status machine and persists it, so the
/// scheduler never inspects sync results.
#[async_trait]
pub trait SyncWorker: Send + Sync {
    /// Slot this worker instance is bound to.
    fn slot_id(&self) -> SlotId;

    /// Execute the sync for `task`, observing `cancel` cooperatively.
    async fn run(&self, task: MirrorTask, cancel: broadcast::Receiver<()>);
}

/// Factory producing a fresh [`SyncWorker`] for each slot launch.
#[async_trait]
pub trait SyncWorkerFactory: Send + Sync {
    async fn create(&self, slot_id: SlotId) -> Result<Arc<dyn SyncWorker>, SyncError>;
}
