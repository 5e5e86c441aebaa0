//! OCR backend abstraction.
//!
//! A single backend (Tesseract, shelled out via CLI) is wired in today, but
//! callers depend only on [`OcrBackend`] so a future backend can be dropped
//! in without touching the image/PDF processors.

mod model_utils;
mod tesseract;

pub mod extractor;

use std::path::Path;

pub use tesseract::TesseractBackend;

/// Errors raised while running an OCR backend.
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR backend unavailable: {0}")]
    BackendNotAvailable(String),
    #[error("OCR run failed: {0}")]
    OcrFailed(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which concrete backend produced an [`OcrResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrBackendType {
    Tesseract,
}

/// Tunables passed to a backend at construction time.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Tesseract language pack, e.g. "jpn+eng".
    pub language: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "jpn+eng".to_string(),
        }
    }
}

/// Outcome of running OCR over an image or a single PDF page.
#[derive(Debug, Clone)]
pub struct OcrResult {
    pub text: String,
    pub confidence: Option<f32>,
    pub backend: OcrBackendType,
    pub processing_time_ms: u64,
}

/// A pluggable OCR engine.
pub trait OcrBackend: Send + Sync {
    fn backend_type(&self) -> OcrBackendType;
    fn is_available(&self) -> bool;
    fn availability_hint(&self) -> String;
    fn ocr_image(&self, image_path: &Path) -> Result<OcrResult, OcrError>;
    fn ocr_pdf_page(&self, pdf_path: &Path, page: u32) -> Result<OcrResult, OcrError>;
}
