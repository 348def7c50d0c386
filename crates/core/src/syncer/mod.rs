//! Sync workers: the components performing the actual object transfer
//! for one mirror task.
//!
//! The worker manager treats workers as opaque: it creates one per slot
//! launch through [`SyncWorkerFactory`], hands it a cancellation receiver,
//! and waits for [`SyncWorker::run`] to return. Outcomes (success, failure,
//! cancellation) are persisted by the worker itself.

mod config;
mod lfs;
mod traits;
mod types;

pub use config::SyncerConfig;
pub use lfs::{LfsSyncWorker, LfsSyncWorkerFactory};
pub use traits::{SlotId, SyncError, SyncWorker, SyncWorkerFactory};
pub use types::{
    LfsBatchObject, LfsBatchRequest, LfsBatchResponse, LfsPointer, LfsTaskPayload,
};
