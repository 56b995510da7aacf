//! Danmu read routes.
//!
//! Read-only views over the retention buffer. Lists are oldest first.

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    routing::get,
};
use danmaku::{DanmuMessage, IntakeSnapshot};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;

/// Query parameters for listing danmu.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Only return the newest `limit` messages
    pub limit: Option<usize>,
}

/// Buffer contents.
#[derive(Debug, Serialize)]
pub struct DanmuListResponse {
    pub items: Vec<DanmuMessage>,
    pub len: usize,
    pub capacity: usize,
}

/// Intake counters plus buffer occupancy.
#[derive(Debug, Serialize)]
pub struct DanmuStatsResponse {
    #[serde(flatten)]
    pub intake: IntakeSnapshot,
    pub buffered: usize,
    pub capacity: usize,
    pub total_pushed: u64,
}

/// Create the danmu router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_danmu))
        .route("/latest", get(latest_danmu))
        .route("/stats", get(danmu_stats))
}

async fn list_danmu(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<DanmuListResponse>> {
    let Query(query) = query?;
    let items = match query.limit {
        Some(limit) => state.buffer.recent(limit),
        None => state.buffer.snapshot(),
    };

    Ok(Json(DanmuListResponse {
        len: items.len(),
        capacity: state.buffer.capacity(),
        items,
    }))
}

async fn latest_danmu(State(state): State<AppState>) -> ApiResult<Json<DanmuMessage>> {
    state
        .buffer
        .latest()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("No danmu retained yet"))
}

async fn danmu_stats(State(state): State<AppState>) -> Json<DanmuStatsResponse> {
    Json(DanmuStatsResponse {
        intake: state.stats.snapshot(),
        buffered: state.buffer.len(),
        capacity: state.buffer.capacity(),
        total_pushed: state.buffer.total_pushed(),
    })
}
