//! Sync worker configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for LFS sync workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncerConfig {
    /// Directory where synchronized LFS objects are stored.
    #[serde(default = "default_objects_dir")]
    pub objects_dir: PathBuf,

    /// Timeout for LFS batch API calls (seconds). Object downloads are
    /// streamed and not bounded by this.
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,
}

fn default_objects_dir() -> PathBuf {
    PathBuf::from("lfs-objects")
}

fn default_batch_timeout() -> u64 {
    30
}

impl Default for SyncerConfig {
    fn default() -> Self {
        Self {
            objects_dir: default_objects_dir(),
            batch_timeout_secs: default_batch_timeout(),
        }
    }
}
