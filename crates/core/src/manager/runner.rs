//! Sync worker manager implementation.
//!
//! Owns the capacity pool, the two work queues and the slot table, and
//! drives tasks onto worker slots:
//! - the dispatcher pulls claimed tasks out of the store into the normal
//!   queue;
//! - the scheduling loop pairs one free slot id with one queued task,
//!   preferring the priority queue, and launches the worker
//!   asynchronously;
//! - operator calls (stop, re-run) act on the slot table.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::metrics;
use crate::syncer::{SlotId, SyncWorkerFactory};
use crate::task::{MirrorTask, MirrorTaskStatus, MirrorTaskStore};

use super::config::SyncManagerConfig;
use super::dispatcher::Dispatcher;
use super::slot::{Slot, SlotPermit};
use super::types::{ManagerError, RequeueHandle};

/// Slot targeted by re-run requests that do not name one.
const DEFAULT_RERUN_SLOT: SlotId = 1;

/// The sync worker manager.
///
/// Constructed once per process by the composition root with its
/// dependencies injected; cheap to share behind an [`Arc`].
pub struct SyncWorkerManager {
    config: SyncManagerConfig,
    task_store: Arc<dyn MirrorTaskStore>,
    worker_factory: Arc<dyn SyncWorkerFactory>,

    /// Busy slots. The only state touched by multiple concurrent flows;
    /// every access goes through this single lock.
    slots: Arc<Mutex<HashMap<SlotId, Slot>>>,

    // Capacity pool: free slot ids, sized to worker_count.
    free_tx: mpsc::Sender<SlotId>,
    free_rx: Mutex<Option<mpsc::Receiver<SlotId>>>,

    // Work queues. Capacity 1: a producer blocks until a slot consumer is
    // ready, bounding its lookahead to one task.
    normal_tx: mpsc::Sender<MirrorTask>,
    normal_rx: Mutex<Option<mpsc::Receiver<MirrorTask>>>,
    priority_tx: mpsc::Sender<MirrorTask>,
    priority_rx: Mutex<Option<mpsc::Receiver<MirrorTask>>>,

    running: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

impl SyncWorkerManager {
    pub fn new(
        config: SyncManagerConfig,
        task_store: Arc<dyn MirrorTaskStore>,
        worker_factory: Arc<dyn SyncWorkerFactory>,
    ) -> Self {
        let (free_tx, free_rx) = mpsc::channel(config.worker_count.max(1));
        let (normal_tx, normal_rx) = mpsc::channel(1);
        let (priority_tx, priority_rx) = mpsc::channel(1);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            task_store,
            worker_factory,
            slots: Arc::new(Mutex::new(HashMap::new())),
            free_tx,
            free_rx: Mutex::new(Some(free_rx)),
            normal_tx,
            normal_rx: Mutex::new(Some(normal_rx)),
            priority_tx,
            priority_rx: Mutex::new(Some(priority_rx)),
            running: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    /// Start the manager: crash recovery, pool seeding, dispatcher and
    /// scheduling loop.
    ///
    /// The crash-recovery reset runs before anything is dispatched, so a
    /// task orphaned in its claimed status by a previous process can never
    /// race a fresh claim. A store failure here aborts the start and is
    /// returned to the caller.
    pub async fn start(&self) -> Result<(), ManagerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("sync worker manager already running");
            return Ok(());
        }

        let reset = match self
            .task_store
            .reset_status(
                MirrorTaskStatus::LfsSyncStart,
                MirrorTaskStatus::RepoSyncFinished,
            )
            .await
        {
            Ok(count) => count,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };
        info!(count = reset, "reset orphaned claimed tasks for dispatch");

        let (free_rx, normal_rx, priority_rx) = {
            let free = self.free_rx.lock().unwrap().take();
            let normal = self.normal_rx.lock().unwrap().take();
            let priority = self.priority_rx.lock().unwrap().take();
            match (free, normal, priority) {
                (Some(f), Some(n), Some(p)) => (f, n, p),
                _ => {
                    warn!("sync worker manager was already started once");
                    return Ok(());
                }
            }
        };

        for id in 1..=self.config.worker_count.max(1) {
            if self.free_tx.send(id).await.is_err() {
                return Err(ManagerError::QueueClosed);
            }
        }

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.task_store),
            self.normal_tx.clone(),
            Duration::from_millis(self.config.dispatch_retry_ms),
            self.shutdown_tx.subscribe(),
        );
        tokio::spawn(dispatcher.run());

        tokio::spawn(Self::schedule_loop(
            free_rx,
            priority_rx,
            normal_rx,
            self.shutdown_tx.subscribe(),
            self.free_tx.clone(),
            Arc::clone(&self.slots),
            Arc::clone(&self.worker_factory),
        ));

        info!(
            worker_count = self.config.worker_count,
            "sync worker manager started"
        );
        Ok(())
    }

    /// Signal the dispatcher and scheduling loop to stop.
    ///
    /// Running workers are left to finish; their tasks stay claimed in the
    /// store and are reclaimed by the crash-recovery reset of the next
    /// start.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("sync worker manager not running");
            return;
        }
        info!("stopping sync worker manager");
        let _ = self.shutdown_tx.send(());
    }

    /// Pair free slots with queued tasks, forever. A pending priority-queue
    /// item always beats a pending normal-queue item.
    async fn schedule_loop(
        mut free_rx: mpsc::Receiver<SlotId>,
        mut priority_rx: mpsc::Receiver<MirrorTask>,
        mut normal_rx: mpsc::Receiver<MirrorTask>,
        mut shutdown_rx: broadcast::Receiver<()>,
        free_tx: mpsc::Sender<SlotId>,
        slots: Arc<Mutex<HashMap<SlotId, Slot>>>,
        worker_factory: Arc<dyn SyncWorkerFactory>,
    ) {
        info!("scheduler started");
        loop {
            let slot_id = tokio::select! {
                _ = shutdown_rx.recv() => break,
                id = free_rx.recv() => match id {
                    Some(id) => id,
                    None => break,
                },
            };
            let permit = SlotPermit::new(slot_id, free_tx.clone());

            let task = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break, // permit drop frees the slot
                Some(task) = priority_rx.recv() => task,
                Some(task) = normal_rx.recv() => task,
            };

            let slots = Arc::clone(&slots);
            let factory = Arc::clone(&worker_factory);
            tokio::spawn(async move {
                Self::run_slot(permit, task, slots, factory).await;
            });
        }
        info!("scheduler stopped");
    }

    /// Run one task on one slot, from worker creation to release.
    async fn run_slot(
        permit: SlotPermit,
        task: MirrorTask,
        slots: Arc<Mutex<HashMap<SlotId, Slot>>>,
        factory: Arc<dyn SyncWorkerFactory>,
    ) {
        let slot_id = permit.id();

        let worker = match factory.create(slot_id).await {
            Ok(worker) => worker,
            Err(e) => {
                error!(
                    slot_id,
                    task_id = task.id,
                    error = %e,
                    "failed to create sync worker, abandoning slot attempt"
                );
                return; // permit drop returns the id to the pool
            }
        };

        let (cancel_tx, cancel_rx) = broadcast::channel(1);
        {
            let mut table = slots.lock().unwrap();
            // At most one active worker per mirror: cancel any slot already
            // bound to this mirror id before registering the new one.
            let preempt: Vec<SlotId> = table
                .iter()
                .filter(|(id, slot)| **id != slot_id && slot.task.mirror_id == task.mirror_id)
                .map(|(id, _)| *id)
                .collect();
            for id in preempt {
                if let Some(old) = table.remove(&id) {
                    info!(
                        slot_id = id,
                        mirror_id = task.mirror_id,
                        task_id = old.task.id,
                        "preempting running task for mirror"
                    );
                    metrics::PREEMPTIONS.inc();
                    old.cancel();
                }
            }
            table.insert(slot_id, Slot::new(task.clone(), cancel_tx));
            metrics::BUSY_SLOTS.set(table.len() as i64);
        }

        info!(
            slot_id,
            task_id = task.id,
            mirror_id = task.mirror_id,
            "task started on slot"
        );
        worker.run(task, cancel_rx).await;

        {
            let mut table = slots.lock().unwrap();
            table.remove(&slot_id);
            metrics::BUSY_SLOTS.set(table.len() as i64);
        }
        debug!(slot_id, "slot released");
        // permit drops here, returning the id to the capacity pool
    }

    /// Cancel the task bound to `slot_id` and free the slot entry.
    ///
    /// Cancellation is cooperative: the worker must observe the signal and
    /// stop; the capacity pool regains the id once it does.
    pub fn stop_worker(&self, slot_id: SlotId) -> Result<(), ManagerError> {
        let mut table = self.slots.lock().unwrap();
        match table.remove(&slot_id) {
            Some(slot) => {
                info!(
                    slot_id,
                    task_id = slot.task.id,
                    mirror_id = slot.task.mirror_id,
                    started_at = %slot.started_at,
                    "stopping worker"
                );
                slot.cancel();
                metrics::BUSY_SLOTS.set(table.len() as i64);
                Ok(())
            }
            None => Err(ManagerError::SlotNotFound(slot_id)),
        }
    }

    /// Cancel and free every slot running a task for `mirror_id`
    /// (normally 0 or 1). Returns how many were cancelled.
    pub fn stop_worker_by_mirror_id(&self, mirror_id: i64) -> Result<usize, ManagerError> {
        let mut table = self.slots.lock().unwrap();
        let matches: Vec<SlotId> = table
            .iter()
            .filter(|(_, slot)| slot.task.mirror_id == mirror_id)
            .map(|(id, _)| *id)
            .collect();

        if matches.is_empty() {
            return Err(ManagerError::MirrorNotRunning(mirror_id));
        }

        let mut cancelled = 0;
        for id in matches {
            if let Some(slot) = table.remove(&id) {
                info!(
                    slot_id = id,
                    mirror_id,
                    task_id = slot.task.id,
                    started_at = %slot.started_at,
                    "stopping worker"
                );
                slot.cancel();
                cancelled += 1;
            }
        }
        metrics::BUSY_SLOTS.set(table.len() as i64);
        Ok(cancelled)
    }

    /// Operator-triggered manual re-sync.
    ///
    /// Frees whatever currently occupies `slot_id` (0 defaults to slot 1),
    /// then pushes `task` into the priority queue from a background task so
    /// this call never blocks. The returned handle resolves when the push
    /// lands, making a wedged or dropped requeue observable.
    pub fn rerun(&self, slot_id: SlotId, task: MirrorTask) -> RequeueHandle {
        let slot_id = if slot_id == 0 {
            DEFAULT_RERUN_SLOT
        } else {
            slot_id
        };

        if self.stop_worker(slot_id).is_err() {
            debug!(slot_id, "no running task to preempt before re-run");
        }
        metrics::RERUN_REQUESTS.inc();

        let queue = self.priority_tx.clone();
        let (done_tx, done_rx) = oneshot::channel();
        let task_id = task.id;
        tokio::spawn(async move {
            let result = queue
                .send(task)
                .await
                .map_err(|_| ManagerError::QueueClosed);
            if result.is_err() {
                warn!(task_id, "re-run enqueue failed: priority queue closed");
            }
            let _ = done_tx.send(result);
        });

        RequeueHandle::new(done_rx)
    }

    /// Point-in-time snapshot of slot id -> running task.
    pub fn running_tasks(&self) -> HashMap<SlotId, MirrorTask> {
        let table = self.slots.lock().unwrap();
        table
            .iter()
            .map(|(id, slot)| (*id, slot.task.clone()))
            .collect()
    }

    /// Number of configured worker slots.
    pub fn worker_count(&self) -> usize {
        self.config.worker_count
    }
}
