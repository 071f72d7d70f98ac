use axum::Json;
use axum::extract::State;

use crate::error::AppError;
use crate::models::job::Job;
use crate::state::AppState;

/// Cap on a single listing response.
const RECENT_LIMIT: i64 = 100;

/// GET /api/jobs
///
/// Recent postings, ordered by required years of experience (fewest first),
/// newest-stored breaking ties.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Job>>, AppError> {
    let jobs = Job::recent(&state.pool, RECENT_LIMIT).await?;
    Ok(Json(jobs))
}
