//! Mirror sync worker manager.
//!
//! A concurrent scheduler that pulls pending mirror-sync tasks from the
//! task store and executes them on a bounded pool of worker slots, with
//! priority preemption, manual re-run, cancellation, and crash recovery.

mod config;
mod dispatcher;
mod runner;
mod slot;
mod types;

pub use config::SyncManagerConfig;
pub use runner::SyncWorkerManager;
pub use types::{ManagerError, RequeueHandle};
