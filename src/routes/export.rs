use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::error::Error;
use crate::export::{export, ExportFormat};
use crate::AppState;

#[derive(Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/entries/{id}/export", get(export_entry))
}

async fn export_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
    Query(params): Query<ExportParams>,
) -> Result<impl IntoResponse, Error> {
    let format: ExportFormat = params.format.as_deref().unwrap_or("markdown").parse()?;

    let detail = state.manager.get_entry_detail(&entry_id).await?;
    let doc = export(&detail, format)?;

    let content_disposition = format!("attachment; filename=\"{}\"", doc.filename);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(doc.content_type),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&content_disposition)
            .map_err(|e| Error::Export(e.to_string()))?,
    );

    Ok((headers, doc.bytes))
}
