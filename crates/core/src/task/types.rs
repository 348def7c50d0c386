//! Core mirror task data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Priority for queue ordering (higher = dispatched sooner).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MirrorPriority {
    Low,
    Medium,
    High,
    /// Operator-requested syncs jump ahead of everything scheduled.
    Asap,
}

impl MirrorPriority {
    /// Numeric rank used for store ordering.
    pub fn rank(&self) -> i64 {
        match self {
            MirrorPriority::Low => 1,
            MirrorPriority::Medium => 2,
            MirrorPriority::High => 3,
            MirrorPriority::Asap => 4,
        }
    }

    pub fn from_rank(rank: i64) -> Self {
        match rank {
            r if r >= 4 => MirrorPriority::Asap,
            3 => MirrorPriority::High,
            2 => MirrorPriority::Medium,
            _ => MirrorPriority::Low,
        }
    }
}

/// Lifecycle status of a mirror task.
///
/// State machine flow:
/// ```text
/// Queued -> RepoSyncStart -> RepoSyncFinished -> LfsSyncStart -> LfsSyncFinished
///                |                                    |
///                v                                    v
///         RepoSyncFailed -> RepoSyncFatal      LfsSyncFailed -> LfsSyncFatal
///
/// Any non-fatal state can transition to Cancelled.
/// ```
///
/// `RepoSyncFinished` is the dispatchable status for the LFS-sync phase;
/// `LfsSyncStart` means the task is claimed by a worker slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MirrorTaskStatus {
    Queued,
    RepoSyncStart,
    RepoSyncFailed,
    RepoSyncFinished,
    RepoSyncFatal,
    LfsSyncStart,
    LfsSyncFailed,
    LfsSyncFinished,
    LfsSyncFatal,
    Cancelled,
}

/// Events that drive status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorTaskEvent {
    /// Advance to the next phase (dispatch claim).
    Continue,
    /// Current phase completed successfully.
    Success,
    /// Current phase failed, may be retried.
    Fail,
    /// Repeated failure, giving up.
    Fatal,
    /// Cancelled by an operator or preempted.
    Cancel,
    /// Repo phase finished and there is nothing for the LFS phase to do.
    NoLfs,
}

impl MirrorTaskStatus {
    /// Apply an event, returning the next status or `None` when the
    /// transition is not allowed from the current status.
    pub fn apply(self, event: MirrorTaskEvent) -> Option<MirrorTaskStatus> {
        use MirrorTaskEvent::*;
        use MirrorTaskStatus::*;
        match (self, event) {
            (Queued, Continue) => Some(RepoSyncStart),
            (RepoSyncFinished, Continue) => Some(LfsSyncStart),
            (RepoSyncStart, Success) => Some(RepoSyncFinished),
            (LfsSyncStart, Success) => Some(LfsSyncFinished),
            (RepoSyncStart, Fail) => Some(RepoSyncFailed),
            (LfsSyncStart, Fail) => Some(LfsSyncFailed),
            (RepoSyncFailed, Fatal) => Some(RepoSyncFatal),
            (LfsSyncFailed, Fatal) => Some(LfsSyncFatal),
            (RepoSyncStart, NoLfs) => Some(LfsSyncFinished),
            (Cancelled, Cancel) => None,
            (_, Cancel) => Some(Cancelled),
            _ => None,
        }
    }

    /// Stable string form used for persistence and reporting.
    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorTaskStatus::Queued => "queued",
            MirrorTaskStatus::RepoSyncStart => "repo_sync_start",
            MirrorTaskStatus::RepoSyncFailed => "repo_sync_failed",
            MirrorTaskStatus::RepoSyncFinished => "repo_sync_finished",
            MirrorTaskStatus::RepoSyncFatal => "repo_sync_fatal",
            MirrorTaskStatus::LfsSyncStart => "lfs_sync_start",
            MirrorTaskStatus::LfsSyncFailed => "lfs_sync_failed",
            MirrorTaskStatus::LfsSyncFinished => "lfs_sync_finished",
            MirrorTaskStatus::LfsSyncFatal => "lfs_sync_fatal",
            MirrorTaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<MirrorTaskStatus> {
        match s {
            "queued" => Some(MirrorTaskStatus::Queued),
            "repo_sync_start" => Some(MirrorTaskStatus::RepoSyncStart),
            "repo_sync_failed" => Some(MirrorTaskStatus::RepoSyncFailed),
            "repo_sync_finished" => Some(MirrorTaskStatus::RepoSyncFinished),
            "repo_sync_fatal" => Some(MirrorTaskStatus::RepoSyncFatal),
            "lfs_sync_start" => Some(MirrorTaskStatus::LfsSyncStart),
            "lfs_sync_failed" => Some(MirrorTaskStatus::LfsSyncFailed),
            "lfs_sync_finished" => Some(MirrorTaskStatus::LfsSyncFinished),
            "lfs_sync_fatal" => Some(MirrorTaskStatus::LfsSyncFatal),
            "cancelled" => Some(MirrorTaskStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal statuses are owned by the sync worker, not the scheduler.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MirrorTaskStatus::LfsSyncFinished
                | MirrorTaskStatus::RepoSyncFatal
                | MirrorTaskStatus::LfsSyncFatal
                | MirrorTaskStatus::Cancelled
        )
    }
}

impl std::fmt::Display for MirrorTaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mirror synchronization job.
///
/// Created by the repository-sync phase once a mirror's base repo sync
/// completes; consumed by the LFS-sync worker manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MirrorTask {
    /// Unique identifier.
    pub id: i64,

    /// Mirror this task belongs to. At most one worker may be active
    /// for a given mirror at any instant.
    pub mirror_id: i64,

    /// Current status.
    pub status: MirrorTaskStatus,

    /// Priority for dispatch ordering (higher dispatched sooner).
    pub priority: MirrorPriority,

    /// Clone URL of the upstream repository (reporting and LFS batch API).
    pub source_url: String,

    /// Local repository path, e.g. `models/openai/whisper-large`.
    pub repo_path: String,

    /// Sync progress, 0-100.
    pub progress: i32,

    /// Last error message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Number of retry attempts made for this task.
    #[serde(default)]
    pub retry_count: u32,

    /// Opaque JSON payload produced by the repo-sync phase
    /// (LFS pointers discovered during the base sync).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a new mirror task.
#[derive(Debug, Clone)]
pub struct NewMirrorTask {
    pub mirror_id: i64,
    pub status: MirrorTaskStatus,
    pub priority: MirrorPriority,
    pub source_url: String,
    pub repo_path: String,
    pub payload: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(MirrorPriority::Asap > MirrorPriority::High);
        assert!(MirrorPriority::High > MirrorPriority::Medium);
        assert!(MirrorPriority::Medium > MirrorPriority::Low);
        assert_eq!(MirrorPriority::from_rank(3), MirrorPriority::High);
        assert_eq!(MirrorPriority::from_rank(0), MirrorPriority::Low);
        assert_eq!(MirrorPriority::from_rank(99), MirrorPriority::Asap);
    }

    #[test]
    fn test_dispatch_claim_transition() {
        assert_eq!(
            MirrorTaskStatus::RepoSyncFinished.apply(MirrorTaskEvent::Continue),
            Some(MirrorTaskStatus::LfsSyncStart)
        );
        assert_eq!(
            MirrorTaskStatus::Queued.apply(MirrorTaskEvent::Continue),
            Some(MirrorTaskStatus::RepoSyncStart)
        );
    }

    #[test]
    fn test_lfs_phase_outcomes() {
        assert_eq!(
            MirrorTaskStatus::LfsSyncStart.apply(MirrorTaskEvent::Success),
            Some(MirrorTaskStatus::LfsSyncFinished)
        );
        assert_eq!(
            MirrorTaskStatus::LfsSyncStart.apply(MirrorTaskEvent::Fail),
            Some(MirrorTaskStatus::LfsSyncFailed)
        );
        assert_eq!(
            MirrorTaskStatus::LfsSyncFailed.apply(MirrorTaskEvent::Fatal),
            Some(MirrorTaskStatus::LfsSyncFatal)
        );
    }

    #[test]
    fn test_no_lfs_shortcut() {
        assert_eq!(
            MirrorTaskStatus::RepoSyncStart.apply(MirrorTaskEvent::NoLfs),
            Some(MirrorTaskStatus::LfsSyncFinished)
        );
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        assert_eq!(
            MirrorTaskStatus::LfsSyncStart.apply(MirrorTaskEvent::Continue),
            None
        );
        assert_eq!(
            MirrorTaskStatus::Queued.apply(MirrorTaskEvent::Success),
            None
        );
        assert_eq!(
            MirrorTaskStatus::LfsSyncFinished.apply(MirrorTaskEvent::Fail),
            None
        );
    }

    #[test]
    fn test_cancel_allowed_from_everywhere_but_cancelled() {
        assert_eq!(
            MirrorTaskStatus::LfsSyncStart.apply(MirrorTaskEvent::Cancel),
            Some(MirrorTaskStatus::Cancelled)
        );
        assert_eq!(
            MirrorTaskStatus::Queued.apply(MirrorTaskEvent::Cancel),
            Some(MirrorTaskStatus::Cancelled)
        );
        assert_eq!(
            MirrorTaskStatus::LfsSyncFatal.apply(MirrorTaskEvent::Cancel),
            Some(MirrorTaskStatus::Cancelled)
        );
        assert_eq!(
            MirrorTaskStatus::Cancelled.apply(MirrorTaskEvent::Cancel),
            None
        );
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            MirrorTaskStatus::Queued,
            MirrorTaskStatus::RepoSyncStart,
            MirrorTaskStatus::RepoSyncFailed,
            MirrorTaskStatus::RepoSyncFinished,
            MirrorTaskStatus::RepoSyncFatal,
            MirrorTaskStatus::LfsSyncStart,
            MirrorTaskStatus::LfsSyncFailed,
            MirrorTaskStatus::LfsSyncFinished,
            MirrorTaskStatus::LfsSyncFatal,
            MirrorTaskStatus::Cancelled,
        ] {
            assert_eq!(MirrorTaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MirrorTaskStatus::parse("bogus"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(MirrorTaskStatus::LfsSyncFinished.is_terminal());
        assert!(MirrorTaskStatus::Cancelled.is_terminal());
        assert!(!MirrorTaskStatus::LfsSyncStart.is_terminal());
        assert!(!MirrorTaskStatus::RepoSyncFinished.is_terminal());
    }
}
