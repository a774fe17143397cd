use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use inkleaf::ocr::TextExtractor;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:data/inkleaf.db".to_string());

    let pool = inkleaf::db::init_pool(&database_url).await;

    let app = inkleaf::build_app(pool, make_extractor());

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    let listener = TcpListener::bind(addr).await.unwrap();

    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await.unwrap();
}

#[cfg(feature = "tesseract")]
fn make_extractor() -> Arc<dyn TextExtractor> {
    let languages = std::env::var("OCR_LANGUAGE").unwrap_or_else(|_| "eng".to_string());
    match inkleaf::ocr::TesseractExtractor::new(&languages) {
        Ok(extractor) => Arc::new(extractor),
        Err(e) => {
            tracing::warn!("Tesseract unavailable, ingestion will fail: {e}");
            Arc::new(inkleaf::ocr::UnavailableExtractor::new(e.to_string()))
        }
    }
}

#[cfg(not(feature = "tesseract"))]
fn make_extractor() -> Arc<dyn TextExtractor> {
    tracing::warn!("built without an OCR backend; ingestion will report the engine as unavailable");
    Arc::new(inkleaf::ocr::UnavailableExtractor::new(
        "no OCR backend compiled in (enable the `tesseract` feature)",
    ))
}
