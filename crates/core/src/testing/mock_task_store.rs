//! In-memory mock task store for tests.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::task::{
    MirrorTask, MirrorTaskEvent, MirrorTaskStatus, MirrorTaskStore, NewMirrorTask, TaskStoreError,
};

/// Mock implementation of [`MirrorTaskStore`].
///
/// Provides controllable behavior for testing:
/// - Seed tasks and inspect stored state
/// - Inject a one-shot error into the next store call
/// - Record operation order (claims vs resets) and claim-query counts
pub struct MockTaskStore {
    tasks: RwLock<Vec<MirrorTask>>,
    next_id: AtomicI64,
    next_error: RwLock<Option<TaskStoreError>>,
    /// Ordered log of store operations, for ordering assertions.
    ops: RwLock<Vec<String>>,
    claim_calls: AtomicUsize,
}

impl Default for MockTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTaskStore {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
            next_error: RwLock::new(None),
            ops: RwLock::new(Vec::new()),
            claim_calls: AtomicUsize::new(0),
        }
    }

    /// Insert a task directly, bypassing error injection.
    pub async fn seed(&self, new: NewMirrorTask) -> MirrorTask {
        let now = Utc::now();
        let task = MirrorTask {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            mirror_id: new.mirror_id,
            status: new.status,
            priority: new.priority,
            source_url: new.source_url,
            repo_path: new.repo_path,
            progress: 0,
            error_message: None,
            retry_count: 0,
            payload: new.payload,
            created_at: now,
            updated_at: now,
        };
        self.tasks.write().await.push(task.clone());
        task
    }

    /// Configure the next store call to fail with the given error.
    pub async fn set_next_error(&self, error: TaskStoreError) {
        *self.next_error.write().await = Some(error);
    }

    /// Snapshot of all stored tasks.
    pub async fn all(&self) -> Vec<MirrorTask> {
        self.tasks.read().await.clone()
    }

    /// Current status of a stored task.
    pub async fn status_of(&self, id: i64) -> Option<MirrorTaskStatus> {
        self.tasks
            .read()
            .await
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.status)
    }

    /// Number of claim queries (`find_highest_priority_by_status`) so far.
    pub fn claim_calls(&self) -> usize {
        self.claim_calls.load(Ordering::SeqCst)
    }

    /// Ordered log of operations ("reset", "claim", "update", ...).
    pub async fn op_log(&self) -> Vec<String> {
        self.ops.read().await.clone()
    }

    async fn record(&self, op: &str) {
        self.ops.write().await.push(op.to_string());
    }

    async fn take_error(&self) -> Option<TaskStoreError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl MirrorTaskStore for MockTaskStore {
    async fn create(&self, new: NewMirrorTask) -> Result<MirrorTask, TaskStoreError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.record("create").await;
        Ok(self.seed(new).await)
    }

    async fn update(&self, task: &MirrorTask) -> Result<(), TaskStoreError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.record("update").await;
        let mut tasks = self.tasks.write().await;
        match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(stored) => {
                *stored = task.clone();
                stored.updated_at = Utc::now();
                Ok(())
            }
            None => Err(TaskStoreError::NotFound),
        }
    }

    async fn find_by_id(&self, id: i64) -> Result<MirrorTask, TaskStoreError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.tasks
            .read()
            .await
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(TaskStoreError::NotFound)
    }

    async fn find_by_mirror_id(&self, mirror_id: i64) -> Result<MirrorTask, TaskStoreError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.tasks
            .read()
            .await
            .iter()
            .filter(|t| t.mirror_id == mirror_id)
            .max_by_key(|t| t.id)
            .cloned()
            .ok_or(TaskStoreError::NotFound)
    }

    async fn find_highest_priority_by_status(
        &self,
        statuses: &[MirrorTaskStatus],
    ) -> Result<MirrorTask, TaskStoreError> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        self.record("claim").await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let mut tasks = self.tasks.write().await;
        let candidate = tasks
            .iter_mut()
            .filter(|t| statuses.contains(&t.status))
            .max_by_key(|t| (t.priority.rank(), t.id));

        let Some(task) = candidate else {
            return Err(TaskStoreError::NotFound);
        };

        let next = task.status.apply(MirrorTaskEvent::Continue).ok_or_else(|| {
            TaskStoreError::InvalidTransition {
                status: task.status.to_string(),
                event: "continue".to_string(),
            }
        })?;
        task.status = next;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn reset_status(
        &self,
        from: MirrorTaskStatus,
        to: MirrorTaskStatus,
    ) -> Result<u64, TaskStoreError> {
        self.record("reset").await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        let mut tasks = self.tasks.write().await;
        let mut count = 0;
        for task in tasks.iter_mut().filter(|t| t.status == from) {
            task.status = to;
            task.updated_at = Utc::now();
            count += 1;
        }
        Ok(count)
    }

    async fn list_by_status_with_priority(
        &self,
        statuses: &[MirrorTaskStatus],
        per: i64,
        page: i64,
    ) -> Result<Vec<MirrorTask>, TaskStoreError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        let page = page.max(1);
        let mut matching: Vec<MirrorTask> = self
            .tasks
            .read()
            .await
            .iter()
            .filter(|t| statuses.contains(&t.status))
            .cloned()
            .collect();
        matching.sort_by_key(|t| std::cmp::Reverse((t.priority.rank(), t.id)));
        Ok(matching
            .into_iter()
            .skip(((page - 1) * per) as usize)
            .take(per as usize)
            .collect())
    }
}
