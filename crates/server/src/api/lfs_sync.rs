//! LFS sync worker control handlers (admin surface).

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use hubsync_core::{ManagerError, SlotId};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for stopping a worker by slot id
#[derive(Debug, Deserialize)]
pub struct StopWorkerBody {
    pub id: SlotId,
}

/// Request body for an immediate re-sync
#[derive(Debug, Deserialize)]
pub struct SyncNowBody {
    pub mirror_id: i64,
    /// Worker slot to run on; 0 targets the default slot.
    #[serde(default)]
    pub worker_id: SlotId,
}

/// Request body for cancelling a mirror's running sync
#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub mirror_id: i64,
}

/// Simple message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Cancel response
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub found: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map manager errors onto the admin API contract: not-found conditions
/// become 404, everything else is an opaque 500.
fn error_response(err: ManagerError) -> (StatusCode, Json<ErrorResponse>) {
    let status = if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Stop the worker bound to a slot id
pub async fn stop_worker_by_id(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StopWorkerBody>,
) -> Result<Json<MessageResponse>, impl IntoResponse> {
    match state.mirror_sync().stop_worker(body.id) {
        Ok(()) => Ok(Json(MessageResponse {
            message: format!("worker {} stopped", body.id),
        })),
        Err(e) => Err(error_response(e)),
    }
}

/// Re-sync a mirror immediately
pub async fn sync_now(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SyncNowBody>,
) -> Result<(StatusCode, Json<MessageResponse>), impl IntoResponse> {
    match state
        .mirror_sync()
        .sync_now(body.worker_id, body.mirror_id)
        .await
    {
        Ok(()) => Ok((
            StatusCode::ACCEPTED,
            Json(MessageResponse {
                message: format!("re-sync of mirror {} requested", body.mirror_id),
            }),
        )),
        Err(e) => Err(error_response(e)),
    }
}

/// Cancel the running sync for a mirror
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CancelBody>,
) -> Result<Json<CancelResponse>, impl IntoResponse> {
    match state.mirror_sync().cancel(body.mirror_id) {
        Ok(found) => Ok(Json(CancelResponse { found })),
        Err(e) => Err(error_response(e)),
    }
}
