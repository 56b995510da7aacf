//! Runtime log filter control.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::logging::{LoggingConfig, available_modules};

/// Body of `PUT /api/logging`.
#[derive(Debug, Deserialize)]
pub struct SetFilterRequest {
    /// `EnvFilter` directive, e.g. `danmu_relay=debug,tungstenite=trace`
    pub filter: String,
}

#[derive(Debug, Serialize)]
pub struct LogTarget {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LoggingResponse {
    pub filter: String,
    pub targets: Vec<LogTarget>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_filter).put(set_filter))
}

fn logging(state: &AppState) -> ApiResult<&Arc<LoggingConfig>> {
    state
        .logging
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Runtime log control is not enabled"))
}

fn describe(logging: &LoggingConfig) -> LoggingResponse {
    LoggingResponse {
        filter: logging.get_filter(),
        targets: available_modules()
            .into_iter()
            .map(|(name, description)| LogTarget { name, description })
            .collect(),
    }
}

async fn get_filter(State(state): State<AppState>) -> ApiResult<Json<LoggingResponse>> {
    Ok(Json(describe(logging(&state)?)))
}

async fn set_filter(
    State(state): State<AppState>,
    request: Result<Json<SetFilterRequest>, JsonRejection>,
) -> ApiResult<Json<LoggingResponse>> {
    let Json(request) = request?;
    let logging = logging(&state)?;
    logging.set_filter(&request.filter)?;
    Ok(Json(describe(logging)))
}
