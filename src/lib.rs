pub mod db;
pub mod error;
pub mod export;
pub mod manager;
pub mod models;
pub mod ocr;
pub mod repo;
pub mod routes;

use std::sync::Arc;

use axum::{routing::get, Router};
use sqlx::SqlitePool;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use manager::EntryManager;
use ocr::TextExtractor;
use repo::Repository;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub manager: EntryManager,
}

async fn health() -> &'static str {
    "ok"
}

/// Build the full Axum application router.
///
/// Caller is responsible for running database migrations on `pool`
/// beforehand. The extractor is injected so deployments can pick an OCR
/// backend and tests can substitute a fake engine.
pub fn build_app(pool: SqlitePool, extractor: Arc<dyn TextExtractor>) -> Router {
    let manager = EntryManager::new(Repository::new(pool.clone()), extractor);
    let state = AppState { db: pool, manager };

    Router::new()
        .route("/health", get(health))
        .merge(routes::entries::router())
        .merge(routes::pages::router())
        .merge(routes::tags::router())
        .merge(routes::export::router())
        .merge(routes::stats::router())
        .layer(
            TraceLayer::new_for_http()
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
