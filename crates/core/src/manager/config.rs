//! Worker manager configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the sync worker manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncManagerConfig {
    /// Number of worker slots (must be >= 1).
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// How long the dispatcher sleeps after finding no dispatchable task
    /// or hitting a store error (milliseconds).
    #[serde(default = "default_dispatch_retry")]
    pub dispatch_retry_ms: u64,
}

fn default_worker_count() -> usize {
    4
}

fn default_dispatch_retry() -> u64 {
    5000 // 5 seconds
}

impl Default for SyncManagerConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            dispatch_retry_ms: default_dispatch_retry(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncManagerConfig::default();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.dispatch_retry_ms, 5000);
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
            worker_count = 8
        "#;
        let config: SyncManagerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.dispatch_retry_ms, 5000);
    }
}
