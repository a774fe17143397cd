use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};

use crate::error::Error;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(stats))
}

async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, Error> {
    Ok(Json(state.manager.stats().await?))
}
