mod config;
mod db;
mod enrich;
mod error;
mod ingest;
mod models;
mod routes;
mod scrapers;
mod search;
mod sites;
mod state;

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use clap::Parser;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::config::{Command, Config, DEFAULT_MAX_RESULTS, DEFAULT_QUERY, DEFAULT_WINDOW};
use crate::state::AppState;

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz(pool: PgPool) -> impl IntoResponse {
    let result: Result<(i32,), _> = sqlx::query_as("SELECT 1").fetch_one(&pool).await;
    match result {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("jobscout=info,tower_http=info")),
        )
        .init();

    let config = Config::parse();

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;

    if config.run_migrations {
        tracing::info!("Running database migrations...");
        db::run_migrations(&pool).await?;
        tracing::info!("Migrations complete");
    }

    let state = AppState::from_config(&config, pool)?;

    match config.resolved_command() {
        Command::Serve { listen_addr } => serve(state, &listen_addr).await?,
        Command::Refresh { query, window, max } => {
            let query = query.unwrap_or_else(|| DEFAULT_QUERY.to_string());
            let window = window.unwrap_or(DEFAULT_WINDOW);
            let max = max.unwrap_or(DEFAULT_MAX_RESULTS);
            let refreshed = state.refresh(&query, window, max).await?;
            tracing::info!("Refresh complete: {refreshed} postings processed");
        }
    }

    Ok(())
}

async fn serve(state: AppState, listen_addr: &str) -> anyhow::Result<()> {
    let readyz_pool = state.pool.clone();
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(move || readyz(readyz_pool.clone())))
        .merge(routes::ui::router())
        .merge(routes::api::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("Listening on {listen_addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
