//! Mock sync worker and factory for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use crate::syncer::{SlotId, SyncError, SyncWorker, SyncWorkerFactory};
use crate::task::MirrorTask;

/// A recorded worker run for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub slot_id: SlotId,
    pub task_id: i64,
    pub mirror_id: i64,
}

#[derive(Default)]
struct MockSyncState {
    /// How long a run takes before completing on its own. `None` means the
    /// run only ends when cancelled.
    run_duration: RwLock<Option<Duration>>,
    started: RwLock<Vec<RunRecord>>,
    finished: RwLock<Vec<RunRecord>>,
    cancelled: RwLock<Vec<RunRecord>>,
    /// Number of upcoming `create` calls that should fail.
    failing_creates: AtomicUsize,
    create_calls: AtomicUsize,
}

/// Mock [`SyncWorkerFactory`] producing controllable workers.
///
/// By default a worker runs until it is cancelled, which keeps its slot
/// busy for capacity and preemption tests. `set_run_duration` makes runs
/// complete on their own.
#[derive(Clone, Default)]
pub struct MockSyncWorkerFactory {
    state: Arc<MockSyncState>,
}

impl MockSyncWorkerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make worker runs complete after `duration` (when not cancelled
    /// first).
    pub async fn set_run_duration(&self, duration: Duration) {
        *self.state.run_duration.write().await = Some(duration);
    }

    /// Fail the next `n` factory calls.
    pub fn fail_next_creates(&self, n: usize) {
        self.state.failing_creates.store(n, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.state.create_calls.load(Ordering::SeqCst)
    }

    pub async fn started(&self) -> Vec<RunRecord> {
        self.state.started.read().await.clone()
    }

    pub async fn finished(&self) -> Vec<RunRecord> {
        self.state.finished.read().await.clone()
    }

    pub async fn cancelled(&self) -> Vec<RunRecord> {
        self.state.cancelled.read().await.clone()
    }

    /// Poll until `predicate` over the started-run records holds, or panic
    /// after `timeout`.
    pub async fn wait_for_started(
        &self,
        predicate: impl Fn(&[RunRecord]) -> bool,
        timeout: Duration,
    ) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if predicate(&self.started().await) {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("timed out waiting for worker runs: {:?}", self.started().await);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Poll until `predicate` over the cancelled-run records holds, or
    /// panic after `timeout`.
    pub async fn wait_for_cancelled(
        &self,
        predicate: impl Fn(&[RunRecord]) -> bool,
        timeout: Duration,
    ) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if predicate(&self.cancelled().await) {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "timed out waiting for cancellations: {:?}",
                    self.cancelled().await
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl SyncWorkerFactory for MockSyncWorkerFactory {
    async fn create(&self, slot_id: SlotId) -> Result<Arc<dyn SyncWorker>, SyncError> {
        self.state.create_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.state.failing_creates.load(Ordering::SeqCst);
        if failing > 0 {
            self.state.failing_creates.store(failing - 1, Ordering::SeqCst);
            return Err(SyncError::WorkerCreation("mock create failure".to_string()));
        }
        Ok(Arc::new(MockSyncWorker {
            slot_id,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockSyncWorker {
    slot_id: SlotId,
    state: Arc<MockSyncState>,
}

#[async_trait]
impl SyncWorker for MockSyncWorker {
    fn slot_id(&self) -> SlotId {
        self.slot_id
    }

    async fn run(&self, task: MirrorTask, mut cancel: broadcast::Receiver<()>) {
        let record = RunRecord {
            slot_id: self.slot_id,
            task_id: task.id,
            mirror_id: task.mirror_id,
        };
        self.state.started.write().await.push(record.clone());

        let duration = *self.state.run_duration.read().await;
        match duration {
            Some(duration) => {
                tokio::select! {
                    _ = cancel.recv() => {
                        self.state.cancelled.write().await.push(record);
                    }
                    _ = tokio::time::sleep(duration) => {
                        self.state.finished.write().await.push(record);
                    }
                }
            }
            None => {
                let _ = cancel.recv().await;
                self.state.cancelled.write().await.push(record);
            }
        }
    }
}
