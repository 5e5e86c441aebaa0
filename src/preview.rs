//! Multi-page preview rendering for the preview worker: given a downloaded
//! PDF (Office/DocuWorks files are normalised to PDF upstream, the same way
//! `processor::processors::office`/`docuworks` delegate to the PDF
//! pipeline), render each page to a size- and quality-capped JPEG via
//! `pdftoppm`, honouring the configured page cap.

use std::path::Path;

use image::imageops::FilterType;
use thiserror::Error;

use crate::config::PreviewConfig;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("pdftoppm not found on PATH")]
    BinaryMissing,
    #[error("pdftoppm exited non-zero rendering page {page}")]
    RenderFailed { page: u32 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image decode error: {0}")]
    Decode(#[from] image::ImageError),
}

pub struct RenderedPage {
    pub page_number: u32,
    pub jpeg_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Render up to `config.max_pages` pages of `pdf_path` to JPEG, each scaled
/// down to fit within `config.max_width`x`config.max_height` and encoded at
/// `config.quality`.
pub fn render_pages(pdf_path: &Path, config: &PreviewConfig) -> Result<Vec<RenderedPage>, PreviewError> {
    let total_pages = count_pages(pdf_path)?.min(config.max_pages);
    let mut pages = Vec::with_capacity(total_pages as usize);

    for page_number in 1..=total_pages {
        let temp_dir = tempfile::tempdir()?;
        let prefix = temp_dir.path().join("page");

        let status = std::process::Command::new("pdftoppm")
            .args(["-jpeg", "-r", &config.dpi.to_string()])
            .args(["-f", &page_number.to_string(), "-l", &page_number.to_string()])
            .arg(pdf_path)
            .arg(&prefix)
            .status();

        let status = match status {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(PreviewError::BinaryMissing),
            Err(e) => return Err(PreviewError::Io(e)),
        };
        if !status.success() {
            return Err(PreviewError::RenderFailed { page: page_number });
        }

        let rendered = find_rendered_file(temp_dir.path(), page_number)
            .ok_or(PreviewError::RenderFailed { page: page_number })?;

        let image = image::open(&rendered)?;
        let resized = image.resize(config.max_width, config.max_height, FilterType::Lanczos3);

        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, config.quality);
        encoder.encode_image(&resized)?;

        pages.push(RenderedPage {
            page_number,
            jpeg_bytes: buffer,
            width: resized.width(),
            height: resized.height(),
        });
    }

    Ok(pages)
}

fn find_rendered_file(dir: &Path, page_number: u32) -> Option<std::path::PathBuf> {
    let single = dir.join("page.jpg");
    if single.exists() {
        return Some(single);
    }
    let padded = dir.join(format!("page-{page_number}.jpg"));
    if padded.exists() {
        return Some(padded);
    }
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .find(|p| p.extension().and_then(|e| e.to_str()) == Some("jpg"))
}

fn count_pages(pdf_path: &Path) -> Result<u32, PreviewError> {
    let output = std::process::Command::new("pdfinfo").arg(pdf_path).output();
    let output = match output {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(PreviewError::BinaryMissing),
        Err(e) => return Err(PreviewError::Io(e)),
    };
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix("Pages:") {
            if let Ok(n) = rest.trim().parse::<u32>() {
                return Ok(n);
            }
        }
    }
    Ok(1)
}
