//! Worker manager lifecycle integration tests.
//!
//! These tests drive the manager against mock collaborators and verify
//! its scheduling contract: bounded capacity, crash recovery before
//! dispatch, priority preemption, cancellation, and dispatcher pacing.

use std::sync::Arc;
use std::time::Duration;

use hubsync_core::testing::{fixtures, MockSyncWorkerFactory, MockTaskStore};
use hubsync_core::{
    ManagerError, MirrorPriority, MirrorSyncComponent, MirrorTask, MirrorTaskStatus,
    MirrorTaskStore, SyncManagerConfig, SyncWorkerManager, TaskStoreError,
};

/// Test helper bundling the manager's collaborators.
struct TestHarness {
    store: Arc<MockTaskStore>,
    factory: Arc<MockSyncWorkerFactory>,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            store: Arc::new(MockTaskStore::new()),
            factory: Arc::new(MockSyncWorkerFactory::new()),
        }
    }

    fn manager(&self, worker_count: usize) -> Arc<SyncWorkerManager> {
        Arc::new(SyncWorkerManager::new(
            SyncManagerConfig {
                worker_count,
                dispatch_retry_ms: 30,
            },
            Arc::clone(&self.store) as Arc<dyn MirrorTaskStore>,
            Arc::clone(&self.factory) as _,
        ))
    }

    /// A claimed task ready to be handed to `rerun`, as the façade would
    /// build it.
    async fn claimed_task(&self, mirror_id: i64, priority: MirrorPriority) -> MirrorTask {
        let mut new = fixtures::dispatchable_task(mirror_id, priority);
        new.status = MirrorTaskStatus::LfsSyncStart;
        self.store.seed(new).await
    }
}

async fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn startup_reset_runs_before_first_dispatch() {
    let harness = TestHarness::new();
    let orphan_a = harness.store.seed(fixtures::orphaned_task(1)).await;
    let orphan_b = harness.store.seed(fixtures::orphaned_task(2)).await;

    let manager = harness.manager(2);
    manager.start().await.unwrap();

    // Both orphans become dispatchable again and get picked up.
    harness
        .factory
        .wait_for_started(|runs| runs.len() == 2, WAIT)
        .await;

    let mirrors: Vec<i64> = harness
        .factory
        .started()
        .await
        .iter()
        .map(|r| r.mirror_id)
        .collect();
    assert!(mirrors.contains(&orphan_a.mirror_id));
    assert!(mirrors.contains(&orphan_b.mirror_id));

    // The recovery reset strictly precedes every dispatch query.
    let ops = harness.store.op_log().await;
    let reset_idx = ops.iter().position(|op| op == "reset").unwrap();
    let first_claim_idx = ops.iter().position(|op| op == "claim").unwrap();
    assert!(reset_idx < first_claim_idx);
}

#[tokio::test]
async fn busy_slots_never_exceed_worker_count() {
    let harness = TestHarness::new();
    for mirror_id in 1..=5 {
        harness
            .store
            .seed(fixtures::dispatchable_task(mirror_id, MirrorPriority::Low))
            .await;
    }

    let manager = harness.manager(2);
    manager.start().await.unwrap();

    harness
        .factory
        .wait_for_started(|runs| runs.len() >= 2, WAIT)
        .await;

    // Workers run until cancelled, so the pool saturates at 2 and stays
    // there no matter how often we look.
    for _ in 0..10 {
        let running = manager.running_tasks();
        assert!(running.len() <= 2, "more than 2 busy slots: {:?}", running);
        tokio::time::sleep(Duration::from_millis(15)).await;
    }
    assert_eq!(manager.running_tasks().len(), 2);
    assert_eq!(harness.factory.started().await.len(), 2);
}

#[tokio::test]
async fn rerun_preempts_running_task_for_same_mirror() {
    let harness = TestHarness::new();
    let low = harness
        .store
        .seed(fixtures::dispatchable_task(7, MirrorPriority::Low))
        .await;

    let manager = harness.manager(1);
    manager.start().await.unwrap();

    harness
        .factory
        .wait_for_started(|runs| runs.iter().any(|r| r.task_id == low.id), WAIT)
        .await;

    // Operator re-runs a higher-priority task for the same mirror.
    let high = harness.claimed_task(7, MirrorPriority::Asap).await;
    let handle = manager.rerun(1, high.clone());
    handle.enqueued().await.unwrap();

    harness
        .factory
        .wait_for_started(|runs| runs.iter().any(|r| r.task_id == high.id), WAIT)
        .await;

    let cancelled = harness.factory.cancelled().await;
    assert!(cancelled.iter().any(|r| r.task_id == low.id));

    // At most one active worker per mirror, on the same single slot.
    let running = manager.running_tasks();
    assert_eq!(running.len(), 1);
    let (slot_id, task) = running.iter().next().unwrap();
    assert_eq!(*slot_id, 1);
    assert_eq!(task.id, high.id);
    assert_eq!(task.mirror_id, 7);
}

#[tokio::test]
async fn stop_by_mirror_id_without_running_worker_fails() {
    let harness = TestHarness::new();
    let manager = harness.manager(2);
    manager.start().await.unwrap();

    let err = manager.stop_worker_by_mirror_id(99).unwrap_err();
    assert!(matches!(err, ManagerError::MirrorNotRunning(99)));
}

#[tokio::test]
async fn stop_by_mirror_id_frees_the_slot() {
    let harness = TestHarness::new();
    let first = harness
        .store
        .seed(fixtures::dispatchable_task(1, MirrorPriority::High))
        .await;
    let second = harness
        .store
        .seed(fixtures::dispatchable_task(2, MirrorPriority::Low))
        .await;

    let manager = harness.manager(1);
    manager.start().await.unwrap();

    harness
        .factory
        .wait_for_started(|runs| runs.iter().any(|r| r.task_id == first.id), WAIT)
        .await;

    let cancelled = manager.stop_worker_by_mirror_id(first.mirror_id).unwrap();
    assert_eq!(cancelled, 1);

    assert!(
        wait_until(
            || !manager
                .running_tasks()
                .values()
                .any(|t| t.mirror_id == first.mirror_id),
            WAIT
        )
        .await,
        "cancelled task still listed as running"
    );

    // The capacity pool regained the slot: the queued task starts.
    harness
        .factory
        .wait_for_started(|runs| runs.iter().any(|r| r.task_id == second.id), WAIT)
        .await;
}

#[tokio::test]
async fn dispatcher_survives_not_found_and_respects_retry_delay() {
    let harness = TestHarness::new();
    let manager = Arc::new(SyncWorkerManager::new(
        SyncManagerConfig {
            worker_count: 1,
            dispatch_retry_ms: 100,
        },
        Arc::clone(&harness.store) as Arc<dyn MirrorTaskStore>,
        Arc::clone(&harness.factory) as _,
    ));
    manager.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(350)).await;
    let calls = harness.store.claim_calls();
    // One immediate query plus one per retry window; never faster.
    assert!(calls >= 2, "dispatcher stopped retrying: {} calls", calls);
    assert!(calls <= 6, "dispatcher retried too fast: {} calls", calls);

    // Still alive after repeated misses.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(harness.store.claim_calls() > calls);
}

#[tokio::test]
async fn running_tasks_snapshot_is_idempotent() {
    let harness = TestHarness::new();
    harness
        .store
        .seed(fixtures::dispatchable_task(3, MirrorPriority::Medium))
        .await;

    let manager = harness.manager(1);
    manager.start().await.unwrap();

    harness
        .factory
        .wait_for_started(|runs| runs.len() == 1, WAIT)
        .await;

    let first = manager.running_tasks();
    let second = manager.running_tasks();
    assert_eq!(first, second);
}

#[tokio::test]
async fn waiting_tasks_exclude_running_mirrors() {
    let harness = TestHarness::new();
    let running = harness
        .store
        .seed(fixtures::dispatchable_task(1, MirrorPriority::High))
        .await;
    let mut queued = fixtures::dispatchable_task(2, MirrorPriority::Low);
    queued.status = MirrorTaskStatus::Queued;
    let queued = harness.store.seed(queued).await;

    let manager = harness.manager(1);
    manager.start().await.unwrap();
    let component = MirrorSyncComponent::new(
        Arc::clone(&manager),
        Arc::clone(&harness.store) as Arc<dyn MirrorTaskStore>,
    );

    harness
        .factory
        .wait_for_started(|runs| runs.iter().any(|r| r.task_id == running.id), WAIT)
        .await;

    let list = component.list_tasks(10, 1).await.unwrap();
    let running_mirrors: Vec<i64> = list.running.values().map(|t| t.mirror_id).collect();
    assert!(running_mirrors.contains(&running.mirror_id));
    for waiting in &list.waiting {
        assert!(
            !running_mirrors.contains(&waiting.mirror_id),
            "waiting set contains running mirror {}",
            waiting.mirror_id
        );
    }
    assert!(list.waiting.iter().any(|t| t.mirror_id == queued.mirror_id));
}

#[tokio::test]
async fn priority_queue_wins_over_normal_queue() {
    let harness = TestHarness::new();
    let occupant = harness
        .store
        .seed(fixtures::dispatchable_task(1, MirrorPriority::Low))
        .await;
    let normal = harness
        .store
        .seed(fixtures::dispatchable_task(2, MirrorPriority::Low))
        .await;

    let manager = harness.manager(1);
    manager.start().await.unwrap();

    harness
        .factory
        .wait_for_started(|runs| runs.iter().any(|r| r.task_id == occupant.id), WAIT)
        .await;

    // Park a re-run in the priority queue while the only slot is busy and
    // the dispatcher already holds the normal-queue task.
    let urgent = harness.claimed_task(3, MirrorPriority::Asap).await;
    let handle = manager.rerun(5, urgent.clone());
    handle.enqueued().await.unwrap();

    // Freeing the slot must hand it to the priority task, not the pending
    // normal one.
    manager.stop_worker_by_mirror_id(occupant.mirror_id).unwrap();

    harness
        .factory
        .wait_for_started(|runs| runs.iter().any(|r| r.task_id == urgent.id), WAIT)
        .await;
    let started = harness.factory.started().await;
    assert!(
        !started.iter().any(|r| r.task_id == normal.id),
        "normal-queue task jumped ahead of the priority task"
    );
}

#[tokio::test]
async fn worker_creation_failure_does_not_leak_the_slot() {
    let harness = TestHarness::new();
    harness.factory.fail_next_creates(1);
    let doomed = harness
        .store
        .seed(fixtures::dispatchable_task(1, MirrorPriority::High))
        .await;
    let follow_up = harness
        .store
        .seed(fixtures::dispatchable_task(2, MirrorPriority::Low))
        .await;

    let manager = harness.manager(1);
    manager.start().await.unwrap();

    // First launch dies in the factory; the slot must come back and run
    // the next task.
    harness
        .factory
        .wait_for_started(|runs| runs.iter().any(|r| r.task_id == follow_up.id), WAIT)
        .await;
    assert!(harness.factory.create_calls() >= 2);
    assert!(
        !harness
            .factory
            .started()
            .await
            .iter()
            .any(|r| r.task_id == doomed.id),
        "task whose worker failed to build should not have run"
    );
}

#[tokio::test]
async fn rerun_with_slot_zero_targets_slot_one() {
    let harness = TestHarness::new();
    let occupant = harness
        .store
        .seed(fixtures::dispatchable_task(1, MirrorPriority::Low))
        .await;

    let manager = harness.manager(2);
    manager.start().await.unwrap();

    harness
        .factory
        .wait_for_started(|runs| runs.iter().any(|r| r.task_id == occupant.id), WAIT)
        .await;
    // With a fresh pool the first task lands on slot 1.
    assert_eq!(harness.factory.started().await[0].slot_id, 1);

    let replacement = harness.claimed_task(9, MirrorPriority::Asap).await;
    let handle = manager.rerun(0, replacement.clone());
    handle.enqueued().await.unwrap();

    harness
        .factory
        .wait_for_cancelled(|runs| runs.iter().any(|r| r.task_id == occupant.id), WAIT)
        .await;
}

#[tokio::test]
async fn dispatching_same_mirror_preempts_previous_worker() {
    let harness = TestHarness::new();
    let stale = harness
        .store
        .seed(fixtures::dispatchable_task(4, MirrorPriority::Low))
        .await;

    let manager = harness.manager(2);
    manager.start().await.unwrap();

    harness
        .factory
        .wait_for_started(|runs| runs.iter().any(|r| r.task_id == stale.id), WAIT)
        .await;

    // A fresh task for the same mirror arrives through the normal queue
    // and lands on the second slot; registering it must cancel the first.
    let fresh = harness
        .store
        .seed(fixtures::dispatchable_task(4, MirrorPriority::High))
        .await;

    harness
        .factory
        .wait_for_started(|runs| runs.iter().any(|r| r.task_id == fresh.id), WAIT)
        .await;
    harness
        .factory
        .wait_for_cancelled(|runs| runs.iter().any(|r| r.task_id == stale.id), WAIT)
        .await;

    assert!(
        wait_until(
            || {
                let running = manager.running_tasks();
                running.values().filter(|t| t.mirror_id == 4).count() == 1
            },
            WAIT
        )
        .await,
        "expected exactly one active worker for the mirror"
    );
}

#[tokio::test]
async fn start_fails_when_recovery_reset_fails_and_can_be_retried() {
    let harness = TestHarness::new();
    harness
        .store
        .set_next_error(TaskStoreError::Database("connection refused".into()))
        .await;

    let manager = harness.manager(1);
    let err = manager.start().await.unwrap_err();
    assert!(matches!(
        err,
        ManagerError::Store(TaskStoreError::Database(_))
    ));
    // Nothing was dispatched.
    assert_eq!(harness.store.claim_calls(), 0);

    // A later start succeeds once the store recovers.
    manager.start().await.unwrap();
    harness
        .store
        .seed(fixtures::dispatchable_task(1, MirrorPriority::Low))
        .await;
    harness
        .factory
        .wait_for_started(|runs| runs.len() == 1, WAIT)
        .await;
}
