//! Mirror task model and storage.
//!
//! A [`MirrorTask`] represents one synchronization job for a mirror. Tasks
//! move through the [`MirrorTaskStatus`] state machine; the LFS-sync worker
//! manager dispatches tasks in `RepoSyncFinished` and claims them as
//! `LfsSyncStart`.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteMirrorTaskStore;
pub use store::{MirrorTaskStore, TaskStoreError};
pub use types::{MirrorPriority, MirrorTask, MirrorTaskEvent, MirrorTaskStatus, NewMirrorTask};
