pub mod jobs;
pub mod refresh;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/jobs", get(jobs::list))
        .route("/refresh", post(refresh::trigger))
        .with_state(state);

    Router::new().nest("/api", api)
}
