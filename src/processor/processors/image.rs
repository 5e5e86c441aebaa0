//! Image processor: OCR (Japanese primary, English fallback), thumbnail
//! generation, dimension metadata.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::ImageFormat;

use crate::model::ProcessingResult;
use crate::ocr::{OcrBackend, TesseractBackend};
use crate::processor::{lowercase_extension, Processor, MAX_IMAGE_BYTES};

use super::common::{count_words, elapsed_seconds, error_result, file_name, file_size, PROCESSOR_VERSION};

const NAME: &str = "ImageProcessor";
const THUMBNAIL_MAX_DIM: u32 = 512;

const SUPPORTED_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".tiff", ".tif", ".gif", ".bmp"];

pub struct ImageProcessor {
    ocr: TesseractBackend,
    /// Preprocess (grayscale + contrast boost) before OCR when enabled.
    preprocess_for_ocr: bool,
}

impl ImageProcessor {
    pub fn new(preprocess_for_ocr: bool) -> Self {
        Self {
            ocr: TesseractBackend::new(),
            preprocess_for_ocr,
        }
    }

    fn make_thumbnail(&self, img: &image::DynamicImage) -> Option<Vec<u8>> {
        let thumb = img.resize(THUMBNAIL_MAX_DIM, THUMBNAIL_MAX_DIM, FilterType::Lanczos3);
        let mut buf = Vec::new();
        thumb
            .write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Jpeg)
            .ok()?;
        Some(buf)
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl Processor for ImageProcessor {
    fn can_process(&self, path: &Path) -> bool {
        SUPPORTED_EXTENSIONS.contains(&lowercase_extension(path).as_str())
    }

    async fn process(&self, path: &Path, original_key: &str) -> ProcessingResult {
        let start = Instant::now();
        let size = file_size(path);

        if size > MAX_IMAGE_BYTES {
            return error_result(
                NAME,
                path,
                original_key,
                format!("file too large: {size} bytes (max {MAX_IMAGE_BYTES})"),
            );
        }
        if size == 0 {
            return error_result(NAME, path, original_key, "zero-byte file");
        }

        let path_owned = path.to_path_buf();
        let preprocess = self.preprocess_for_ocr;

        let decoded = tokio::task::spawn_blocking(move || {
            let img = image::open(&path_owned).map_err(|e| e.to_string())?;
            let prepared = if preprocess {
                img.grayscale().adjust_contrast(15.0)
            } else {
                img.clone()
            };
            Ok::<_, String>((img, prepared))
        })
        .await;

        let (original_img, ocr_input) = match decoded {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => return error_result(NAME, path, original_key, format!("not a readable image: {e}")),
            Err(e) => return error_result(NAME, path, original_key, format!("decode task panicked: {e}")),
        };

        let (width, height) = (original_img.width(), original_img.height());
        let thumbnail_bytes = self.make_thumbnail(&original_img);

        let ocr_result = {
            let temp_dir = tempfile::TempDir::new();
            match temp_dir {
                Ok(dir) => {
                    let prepared_path = dir.path().join("prepared.png");
                    if ocr_input.save(&prepared_path).is_ok() {
                        self.ocr.ocr_image(&prepared_path).ok()
                    } else {
                        self.ocr.ocr_image(path).ok()
                    }
                }
                Err(_) => self.ocr.ocr_image(path).ok(),
            }
        };

        let (text, confidence) = match ocr_result {
            Some(r) => (r.text, r.confidence),
            None => (String::new(), None),
        };

        let extension = lowercase_extension(path);
        let mime_type = match extension.as_str() {
            ".png" => "image/png",
            ".jpg" | ".jpeg" => "image/jpeg",
            ".tiff" | ".tif" => "image/tiff",
            ".gif" => "image/gif",
            ".bmp" => "image/bmp",
            _ => "application/octet-stream",
        }
        .to_string();

        let mut metadata = serde_json::Map::new();
        metadata.insert("width".to_string(), width.into());
        metadata.insert("height".to_string(), height.into());

        ProcessingResult {
            success: true,
            error_message: None,
            file_name: file_name(path, original_key),
            file_size: size,
            file_type: extension,
            mime_type,
            word_count: count_words(&text),
            char_count: text.chars().count() as u64,
            extracted_text: text,
            thumbnail_bytes,
            thumbnail_format: Some("JPEG".to_string()),
            metadata,
            processor_name: NAME.to_string(),
            processor_version: PROCESSOR_VERSION.to_string(),
            processing_time_seconds: elapsed_seconds(start),
            ocr_confidence: confidence,
            ocr_language: Some("jpn+eng".to_string()),
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
    fn can_process_known_image_extensions() {
        let processor = ImageProcessor::new(false);
        assert!(processor.can_process(&PathBuf::from("scan.PNG")));
        assert!(processor.can_process(&PathBuf::from("photo.jpeg")));
        assert!(!processor.can_process(&PathBuf::from("report.pdf")));
    }
}
