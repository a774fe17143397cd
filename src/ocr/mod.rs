pub mod extract;
pub mod preprocess;

#[cfg(feature = "tesseract")]
pub use extract::TesseractExtractor;
pub use extract::{cleanup_text, Extraction, TextExtractor, UnavailableExtractor};
pub use preprocess::{load_and_preprocess, preprocess};
