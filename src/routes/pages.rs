use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::Error;
use crate::AppState;

#[derive(Deserialize)]
pub struct IngestRequest {
    pub image_path: String,
    pub page_number: Option<i64>,
}

#[derive(Deserialize)]
pub struct BatchIngestRequest {
    pub image_paths: Vec<String>,
}

#[derive(Deserialize)]
pub struct UpdateTextRequest {
    pub text: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/entries/{id}/pages", post(ingest_page))
        .route("/entries/{id}/pages/batch", post(ingest_pages))
        .route("/pages/{id}/text", post(update_page_text))
        .route("/pages/{id}", delete(delete_page))
}

async fn ingest_page(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
    Json(req): Json<IngestRequest>,
) -> Result<impl IntoResponse, Error> {
    let page = state
        .manager
        .ingest_page(&entry_id, &req.image_path, req.page_number)
        .await?;
    Ok((StatusCode::CREATED, Json(page)))
}

async fn ingest_pages(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
    Json(req): Json<BatchIngestRequest>,
) -> Result<impl IntoResponse, Error> {
    let pages = state.manager.ingest_pages(&entry_id, &req.image_paths).await?;
    Ok((StatusCode::CREATED, Json(pages)))
}

async fn update_page_text(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
    Json(req): Json<UpdateTextRequest>,
) -> Result<impl IntoResponse, Error> {
    Ok(Json(state.manager.update_page_text(&page_id, &req.text).await?))
}

async fn delete_page(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    state.manager.delete_page(&page_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
