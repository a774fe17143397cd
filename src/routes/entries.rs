use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::Error;
use crate::repo::{NewEntry, SearchFilter, TagMatch, UpdateEntry};
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateEntryRequest {
    pub title: Option<String>,
    pub date: Option<String>,
    pub mood: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub struct UpdateEntryRequest {
    pub title: Option<String>,
    pub date: Option<String>,
    pub mood: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
pub struct SearchParams {
    pub query: Option<String>,
    /// Comma-separated tag names.
    pub tags: Option<String>,
    pub tag_match: Option<TagMatch>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl SearchParams {
    fn is_empty(&self) -> bool {
        self.query.is_none()
            && self.tags.is_none()
            && self.tag_match.is_none()
            && self.from.is_none()
            && self.to.is_none()
    }

    fn into_filter(self) -> SearchFilter {
        SearchFilter {
            query: self.query,
            tags: self
                .tags
                .map(|t| {
                    t.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            tag_match: self.tag_match,
            date_from: self.from,
            date_to: self.to,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/entries", post(create_entry).get(list_entries))
        .route(
            "/entries/{id}",
            get(get_entry).post(update_entry).delete(delete_entry),
        )
}

async fn create_entry(
    State(state): State<AppState>,
    Json(req): Json<CreateEntryRequest>,
) -> Result<impl IntoResponse, Error> {
    let detail = state
        .manager
        .create_entry(NewEntry {
            title: req.title,
            date: req.date,
            mood: req.mood,
            tags: req.tags,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn list_entries(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, Error> {
    let entries = if params.is_empty() {
        state.manager.list_entries().await?
    } else {
        state.manager.search(params.into_filter()).await?
    };
    Ok(Json(entries))
}

async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    Ok(Json(state.manager.get_entry_detail(&id).await?))
}

async fn update_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateEntryRequest>,
) -> Result<impl IntoResponse, Error> {
    let entry = state
        .manager
        .update_entry(
            &id,
            UpdateEntry {
                title: req.title,
                date: req.date,
                mood: req.mood,
                tags: req.tags,
            },
        )
        .await?;
    Ok(Json(entry))
}

async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    state.manager.delete_entry(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
