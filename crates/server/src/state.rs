use std::sync::Arc;

use hubsync_core::{
    Authenticator, Config, MirrorSyncComponent, SanitizedConfig, SyncWorkerManager,
};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    manager: Arc<SyncWorkerManager>,
    mirror_sync: MirrorSyncComponent,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        manager: Arc<SyncWorkerManager>,
        mirror_sync: MirrorSyncComponent,
    ) -> Self {
        Self {
            config,
            authenticator,
            manager,
            mirror_sync,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    #[allow(dead_code)]
    pub fn manager(&self) -> &SyncWorkerManager {
        &self.manager
    }

    pub fn mirror_sync(&self) -> &MirrorSyncComponent {
        &self.mirror_sync
    }
}
