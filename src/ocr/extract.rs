use async_trait::async_trait;
use image::GrayImage;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;

/// Result of one OCR pass. Confidence is the engine's mean word confidence in
/// the 0-100 range; empty text with ~0 confidence is a valid outcome, not a
/// failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub text: String,
    pub confidence: f32,
}

impl Extraction {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
        }
    }
}

/// The OCR capability, injected so tests can substitute a fake engine and so
/// the engine handle is explicit state rather than a process-wide global.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, image: &GrayImage) -> Result<Extraction>;
}

/// Stand-in used when the binary was built without an OCR backend or the
/// backend failed to initialize. Every extraction reports the engine as down.
pub struct UnavailableExtractor {
    reason: String,
}

impl UnavailableExtractor {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl TextExtractor for UnavailableExtractor {
    async fn extract(&self, _image: &GrayImage) -> Result<Extraction> {
        Err(crate::error::Error::OcrEngine(self.reason.clone()))
    }
}

static RUNS_OF_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static EXCESS_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r" +([.,;:!?])").unwrap());

/// Normalizes raw OCR output: collapses runs of spaces, trims line edges,
/// caps consecutive blank lines at one, and removes stray spaces before
/// closing punctuation.
pub fn cleanup_text(text: &str) -> String {
    let collapsed = RUNS_OF_SPACES.replace_all(text, " ");
    let trimmed_lines: Vec<&str> = collapsed.lines().map(str::trim).collect();
    let joined = trimmed_lines.join("\n");
    let limited = EXCESS_BLANK_LINES.replace_all(&joined, "\n\n");
    SPACE_BEFORE_PUNCT
        .replace_all(&limited, "$1")
        .trim()
        .to_string()
}

#[cfg(feature = "tesseract")]
pub use tesseract::TesseractExtractor;

#[cfg(feature = "tesseract")]
mod tesseract {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use image::{GrayImage, ImageFormat};
    use leptess::LepTess;

    use super::{cleanup_text, Extraction, TextExtractor};
    use crate::error::{Error, Result};

    /// Local Tesseract engine via leptess. The handle is shared behind a
    /// mutex because Tesseract is not thread-safe; extraction runs on the
    /// blocking pool.
    pub struct TesseractExtractor {
        inner: Arc<Mutex<LepTess>>,
    }

    impl TesseractExtractor {
        pub fn new(languages: &str) -> Result<Self> {
            let lt = LepTess::new(None, languages)
                .map_err(|e| Error::OcrEngine(format!("failed to initialize Tesseract: {e}")))?;
            tracing::info!(languages, "Tesseract OCR initialized");
            Ok(Self {
                inner: Arc::new(Mutex::new(lt)),
            })
        }
    }

    #[async_trait]
    impl TextExtractor for TesseractExtractor {
        async fn extract(&self, image: &GrayImage) -> Result<Extraction> {
            let mut png = Vec::new();
            image
                .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
                .map_err(|e| Error::OcrEngine(format!("failed to encode image: {e}")))?;

            let inner = Arc::clone(&self.inner);
            let extraction = tokio::task::spawn_blocking(move || {
                let mut lt = inner
                    .lock()
                    .map_err(|_| Error::OcrEngine("Tesseract handle poisoned".to_string()))?;
                lt.set_image_from_mem(&png)
                    .map_err(|e| Error::OcrEngine(format!("failed to set image: {e}")))?;
                let text = lt
                    .get_utf8_text()
                    .map_err(|e| Error::OcrEngine(format!("failed to extract text: {e}")))?;
                let confidence = lt.mean_text_conf().max(0) as f32;
                Ok::<_, Error>(Extraction {
                    text: cleanup_text(&text),
                    confidence,
                })
            })
            .await
            .map_err(|e| Error::OcrEngine(format!("OCR task panicked: {e}")))??;

            if extraction.text.is_empty() {
                return Ok(Extraction::empty());
            }
            Ok(extraction)
        }
    }
}
