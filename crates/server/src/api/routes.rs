use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, lfs_sync, mirrors};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Admin surface: worker control and task listing
    let admin_routes = Router::new()
        .route("/config", get(handlers::get_config))
        .route("/lfs_sync/stop_worker_by_id", post(lfs_sync::stop_worker_by_id))
        .route("/lfs_sync/sync_now", post(lfs_sync::sync_now))
        .route("/lfs_sync/cancel", post(lfs_sync::cancel))
        .route("/mirror/tasks", get(mirrors::list_tasks))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            super::middleware::auth_middleware,
        ));

    // Unauthenticated probes
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics));

    let api_routes = admin_routes.merge(public_routes).with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(super::middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
