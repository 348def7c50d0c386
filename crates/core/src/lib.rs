pub mod auth;
pub mod config;
pub mod manager;
pub mod metrics;
pub mod mirror;
pub mod syncer;
pub mod task;
pub mod testing;

pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    SanitizedConfig,
};
pub use manager::{ManagerError, RequeueHandle, SyncManagerConfig, SyncWorkerManager};
pub use mirror::{MirrorSyncComponent, TaskList, TaskSummary};
pub use syncer::{
    LfsSyncWorker, LfsSyncWorkerFactory, SlotId, SyncError, SyncWorker, SyncWorkerFactory,
    SyncerConfig,
};
pub use task::{
    MirrorPriority, MirrorTask, MirrorTaskEvent, MirrorTaskStatus, MirrorTaskStore, NewMirrorTask,
    SqliteMirrorTaskStore, TaskStoreError,
};
