//! DTOs exposed by the mirror sync façade.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::syncer::SlotId;
use crate::task::{MirrorPriority, MirrorTask, MirrorTaskStatus};

/// Reporting view of a mirror task. The only shape handed to the HTTP
/// layer; internal slot-table state never leaves the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSummary {
    pub id: i64,
    pub mirror_id: i64,
    pub status: MirrorTaskStatus,
    pub priority: MirrorPriority,
    pub progress: i32,
    pub source_url: String,
    pub repo_path: String,
}

impl From<MirrorTask> for TaskSummary {
    fn from(task: MirrorTask) -> Self {
        Self {
            id: task.id,
            mirror_id: task.mirror_id,
            status: task.status,
            priority: task.priority,
            progress: task.progress,
            source_url: task.source_url,
            repo_path: task.repo_path,
        }
    }
}

/// Combined view of active and queued work.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskList {
    /// Tasks currently bound to a worker slot, keyed by slot id.
    pub running: HashMap<SlotId, TaskSummary>,
    /// Tasks still queued in the store, ordered by priority.
    pub waiting: Vec<TaskSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_summary_from_task() {
        let task = MirrorTask {
            id: 5,
            mirror_id: 9,
            status: MirrorTaskStatus::LfsSyncStart,
            priority: MirrorPriority::High,
            source_url: "https://upstream.example/m.git".to_string(),
            repo_path: "models/acme/m".to_string(),
            progress: 30,
            error_message: None,
            retry_count: 1,
            payload: Some("{}".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let summary = TaskSummary::from(task);
        assert_eq!(summary.id, 5);
        assert_eq!(summary.mirror_id, 9);
        assert_eq!(summary.progress, 30);
        assert_eq!(summary.status, MirrorTaskStatus::LfsSyncStart);
    }

    #[test]
    fn test_task_list_serialization() {
        let mut list = TaskList::default();
        list.waiting.push(TaskSummary {
            id: 1,
            mirror_id: 2,
            status: MirrorTaskStatus::RepoSyncFinished,
            priority: MirrorPriority::Low,
            progress: 0,
            source_url: "https://upstream.example/a.git".to_string(),
            repo_path: "models/a/a".to_string(),
        });
        let json = serde_json::to_string(&list).unwrap();
        assert!(json.contains("\"running\":{}"));
        assert!(json.contains("\"repo_sync_finished\""));
    }
}
