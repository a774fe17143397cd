use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unreadable image {path}: {reason}")]
    ImageDecode { path: String, reason: String },

    #[error("OCR engine failure: {0}")]
    OcrEngine(String),

    #[error("entry {0} not found")]
    EntryNotFound(String),

    #[error("page {0} not found")]
    PageNotFound(String),

    #[error("page number {page_number} already exists for entry {entry_id}")]
    DuplicatePageNumber { entry_id: String, page_number: i64 },

    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Validation(String),

    #[error("export rendering failed: {0}")]
    Export(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::EntryNotFound(_) | Error::PageNotFound(_) => StatusCode::NOT_FOUND,
            Error::DuplicatePageNumber { .. } => StatusCode::CONFLICT,
            Error::UnsupportedFormat(_) | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::ImageDecode { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::OcrEngine(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Database(e) => {
                tracing::error!("Database error: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::Io(e) => {
                tracing::error!("IO error: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::Export(e) => {
                tracing::error!("Export error: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (status, body).into_response()
    }
}
