use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use image::{GrayImage, Rgb, RgbImage};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use inkleaf::error::Error;
use inkleaf::ocr::{Extraction, TextExtractor};

/// Scripted OCR outcome for one extraction call.
pub enum Scripted {
    Text(&'static str),
    Failure(&'static str),
}

/// Fake OCR engine: pops one scripted outcome per call, and returns an empty
/// extraction once the script runs out.
pub struct FakeExtractor {
    script: Mutex<VecDeque<Scripted>>,
}

impl FakeExtractor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
        })
    }

    pub fn push(&self, outcome: Scripted) {
        self.script.lock().unwrap().push_back(outcome);
    }
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(&self, _image: &GrayImage) -> Result<Extraction, Error> {
        match self.script.lock().unwrap().pop_front() {
            Some(Scripted::Text(text)) => Ok(Extraction {
                text: text.to_string(),
                confidence: if text.is_empty() { 0.0 } else { 88.0 },
            }),
            Some(Scripted::Failure(reason)) => Err(Error::OcrEngine(reason.to_string())),
            None => Ok(Extraction::empty()),
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub db: SqlitePool,
    pub ocr: Arc<FakeExtractor>,
}

impl TestApp {
    pub async fn new() -> Self {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("Failed to create in-memory SQLite pool");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        let ocr = FakeExtractor::new();
        let router = inkleaf::build_app(pool.clone(), ocr.clone());

        Self {
            router,
            db: pool,
            ocr,
        }
    }

    /// Send a request through the app and return the response.
    pub async fn request(&self, req: Request<Body>) -> Response {
        tower::ServiceExt::oneshot(self.router.clone(), req)
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.request(req).await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response {
        let req = Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.request(req).await
    }

    pub async fn delete(&self, uri: &str) -> Response {
        let req = Request::builder()
            .uri(uri)
            .method("DELETE")
            .body(Body::empty())
            .unwrap();
        self.request(req).await
    }

    /// Create an entry through the API and return its id.
    pub async fn create_entry(&self, body: serde_json::Value) -> String {
        let resp = self.post_json("/entries", body).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let json = body_json(resp).await;
        json["id"].as_str().expect("entry id").to_string()
    }

    /// Ingest a page image with a scripted OCR result and return the page id.
    pub async fn ingest_page(
        &self,
        entry_id: &str,
        image_path: &str,
        page_number: Option<i64>,
        text: &'static str,
    ) -> String {
        self.ocr.push(Scripted::Text(text));
        let mut body = serde_json::json!({ "image_path": image_path });
        if let Some(n) = page_number {
            body["page_number"] = serde_json::json!(n);
        }
        let resp = self
            .post_json(&format!("/entries/{entry_id}/pages"), body)
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let json = body_json(resp).await;
        json["id"].as_str().expect("page id").to_string()
    }

    pub async fn count(&self, sql: &str) -> i64 {
        let row: (i64,) = sqlx::query_as(sql).fetch_one(&self.db).await.unwrap();
        row.0
    }
}

/// Write a small decodable journal-page PNG and return its path.
pub fn write_page_image(dir: &Path, name: &str) -> String {
    let mut img = RgbImage::from_pixel(120, 90, Rgb([250, 250, 248]));
    for y in (20..80).step_by(12) {
        for x in 10..110 {
            img.put_pixel(x, y, Rgb([30, 30, 30]));
        }
    }
    let path = dir.join(format!("{name}.png"));
    img.save(&path).expect("write fixture image");
    path.to_string_lossy().to_string()
}

/// Read the full response body as a String.
pub async fn body_string(resp: Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(resp: Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
