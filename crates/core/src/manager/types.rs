//! Types for the sync worker manager.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::syncer::SlotId;
use crate::task::TaskStoreError;

/// Errors that can occur while operating the worker manager.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// No slot is bound to the requested id.
    #[error("no running worker on slot {0}")]
    SlotNotFound(SlotId),

    /// No slot is bound to a task for the requested mirror.
    #[error("no running worker for mirror {0}")]
    MirrorNotRunning(i64),

    /// A work queue was closed; the manager is shutting down.
    #[error("work queue closed")]
    QueueClosed,

    /// Task store failure.
    #[error("task store error: {0}")]
    Store(#[from] TaskStoreError),
}

impl ManagerError {
    /// Whether this error means "the thing you asked about does not exist",
    /// as opposed to an internal failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ManagerError::SlotNotFound(_)
                | ManagerError::MirrorNotRunning(_)
                | ManagerError::Store(TaskStoreError::NotFound)
        )
    }
}

/// Handle returned by a re-run request.
///
/// The re-run push into the priority queue happens in the background so
/// the caller is never blocked; awaiting the handle reveals whether the
/// task was actually enqueued (the push can wedge indefinitely when the
/// pool is saturated and no slot ever frees).
#[derive(Debug)]
pub struct RequeueHandle {
    rx: oneshot::Receiver<Result<(), ManagerError>>,
}

impl RequeueHandle {
    pub(crate) fn new(rx: oneshot::Receiver<Result<(), ManagerError>>) -> Self {
        Self { rx }
    }

    /// Resolve once the task has entered the priority queue.
    pub async fn enqueued(self) -> Result<(), ManagerError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(ManagerError::QueueClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ManagerError::SlotNotFound(3);
        assert_eq!(err.to_string(), "no running worker on slot 3");

        let err = ManagerError::MirrorNotRunning(42);
        assert_eq!(err.to_string(), "no running worker for mirror 42");
    }

    #[test]
    fn test_not_found_classification() {
        assert!(ManagerError::SlotNotFound(1).is_not_found());
        assert!(ManagerError::MirrorNotRunning(1).is_not_found());
        assert!(ManagerError::Store(TaskStoreError::NotFound).is_not_found());
        assert!(!ManagerError::QueueClosed.is_not_found());
        assert!(!ManagerError::Store(TaskStoreError::Database("x".into())).is_not_found());
    }

    #[tokio::test]
    async fn test_requeue_handle_resolves() {
        let (tx, rx) = oneshot::channel();
        let handle = RequeueHandle::new(rx);
        tx.send(Ok(())).unwrap();
        assert!(handle.enqueued().await.is_ok());
    }

    #[tokio::test]
    async fn test_requeue_handle_dropped_sender_is_queue_closed() {
        let (tx, rx) = oneshot::channel::<Result<(), ManagerError>>();
        let handle = RequeueHandle::new(rx);
        drop(tx);
        assert!(matches!(
            handle.enqueued().await,
            Err(ManagerError::QueueClosed)
        ));
    }
}
