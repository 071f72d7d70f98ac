use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use crate::config::{DEFAULT_MAX_RESULTS, DEFAULT_QUERY, DEFAULT_WINDOW};
use crate::error::AppError;
use crate::sites::TimeWindow;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub query: Option<String>,
    pub window: Option<TimeWindow>,
    pub max: Option<usize>,
}

/// POST /api/refresh
///
/// Run one discovery + ingest round. The body is optional; omitted fields
/// fall back to the broad engineering defaults.
pub async fn trigger(
    State(state): State<AppState>,
    body: Option<Json<RefreshRequest>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let query = request.query.unwrap_or_else(|| DEFAULT_QUERY.to_string());
    let window = request.window.unwrap_or(DEFAULT_WINDOW);
    let max = request.max.unwrap_or(DEFAULT_MAX_RESULTS);

    let refreshed = state.refresh(&query, window, max).await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "refreshed": refreshed,
    })))
}
