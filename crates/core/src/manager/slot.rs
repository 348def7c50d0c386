//! Slot bookkeeping: busy-table entries and the capacity-pool permit.

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};

use crate::syncer::SlotId;
use crate::task::MirrorTask;

/// A busy slot: the task currently bound to a worker and its cancellation
/// control. Present in the slot table exactly while the worker runs.
#[derive(Debug)]
pub(crate) struct Slot {
    pub(crate) task: MirrorTask,
    pub(crate) cancel_tx: broadcast::Sender<()>,
    pub(crate) started_at: DateTime<Utc>,
}

impl Slot {
    pub(crate) fn new(task: MirrorTask, cancel_tx: broadcast::Sender<()>) -> Self {
        Self {
            task,
            cancel_tx,
            started_at: Utc::now(),
        }
    }

    /// Signal the bound worker to stop. Cooperative: the worker observes
    /// the signal at its next suspension point.
    pub(crate) fn cancel(&self) {
        let _ = self.cancel_tx.send(());
    }
}

/// Scoped ownership of a slot id drawn from the capacity pool.
///
/// The id goes back to the pool when the permit is dropped, whatever the
/// exit path: normal completion, worker-factory failure, cancellation, or
/// a panic unwinding the slot task.
#[derive(Debug)]
pub(crate) struct SlotPermit {
    id: SlotId,
    pool: mpsc::Sender<SlotId>,
}

impl SlotPermit {
    pub(crate) fn new(id: SlotId, pool: mpsc::Sender<SlotId>) -> Self {
        Self { id, pool }
    }

    pub(crate) fn id(&self) -> SlotId {
        self.id
    }
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        // The pool is sized to hold every slot id and this permit is the
        // id's sole owner, so the send only fails during shutdown when the
        // receiver is gone.
        let _ = self.pool.try_send(self.id);
    }
}
