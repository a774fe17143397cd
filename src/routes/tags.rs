use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::Error;
use crate::AppState;

#[derive(Deserialize)]
pub struct TagRequest {
    pub name: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tags", get(list_tags))
        .route("/entries/{id}/tags", post(attach_tag))
        .route("/entries/{id}/tags/{name}", delete(detach_tag))
}

async fn list_tags(State(state): State<AppState>) -> Result<impl IntoResponse, Error> {
    Ok(Json(state.manager.list_tags().await?))
}

async fn attach_tag(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
    Json(req): Json<TagRequest>,
) -> Result<impl IntoResponse, Error> {
    state.manager.attach_tag(&entry_id, &req.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn detach_tag(
    State(state): State<AppState>,
    Path((entry_id, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, Error> {
    state.manager.detach_tag(&entry_id, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}
