//! Testing utilities and mock implementations.
//!
//! Mock versions of the manager's collaborators (task store, sync worker
//! factory), allowing scheduler tests without a database or network.
//!
//! # Example
//!
//! ```rust,ignore
//! use hubsync_core::testing::{MockSyncWorkerFactory, MockTaskStore};
//!
//! let store = Arc::new(MockTaskStore::new());
//! let factory = Arc::new(MockSyncWorkerFactory::new());
//!
//! // Seed work, start the manager, assert on recorded runs...
//! ```

mod mock_sync_worker;
mod mock_task_store;

pub use mock_sync_worker::{MockSyncWorkerFactory, RunRecord};
pub use mock_task_store::MockTaskStore;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::task::{MirrorPriority, MirrorTaskStatus, NewMirrorTask};

    /// A dispatchable task for the given mirror with reasonable defaults.
    pub fn dispatchable_task(mirror_id: i64, priority: MirrorPriority) -> NewMirrorTask {
        NewMirrorTask {
            mirror_id,
            status: MirrorTaskStatus::RepoSyncFinished,
            priority,
            source_url: format!("https://upstream.example/org/m{}.git", mirror_id),
            repo_path: format!("models/org/m{}", mirror_id),
            payload: None,
        }
    }

    /// A task orphaned mid-claim, as left behind by a crashed process.
    pub fn orphaned_task(mirror_id: i64) -> NewMirrorTask {
        NewMirrorTask {
            status: MirrorTaskStatus::LfsSyncStart,
            ..dispatchable_task(mirror_id, MirrorPriority::Medium)
        }
    }
}
