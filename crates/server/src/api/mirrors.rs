//! Mirror task listing handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use hubsync_core::TaskList;

use crate::state::AppState;

/// Maximum allowed page size
const MAX_PER: i64 = 1000;

/// Default page size
const DEFAULT_PER: i64 = 50;

/// Query parameters for listing mirror tasks
#[derive(Debug, Deserialize)]
pub struct ListTasksParams {
    pub per: Option<i64>,
    pub page: Option<i64>,
}

/// List running and waiting mirror tasks
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTasksParams>,
) -> Result<Json<TaskList>, impl IntoResponse> {
    let per = params.per.unwrap_or(DEFAULT_PER).clamp(1, MAX_PER);
    let page = params.page.unwrap_or(1).max(1);

    match state.mirror_sync().list_tasks(per, page).await {
        Ok(list) => Ok(Json(list)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )),
    }
}
