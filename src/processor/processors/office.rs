//! Office processor (`.doc[x]`, `.xls[x]`, `.ppt[x]`): convert to PDF via
//! an external converter process, then run the PDF pipeline. For PPTX,
//! the embedded thumbnail is read directly from the archive first.
//!
//! Office → PDF conversion is an external collaborator, out of scope for
//! this crate — it is modelled only through its process-invocation
//! contract (binary name, timeout, PDF-on-stdout-path convention).

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::model::ProcessingResult;
use crate::processor::{lowercase_extension, Processor, MAX_OFFICE_BYTES};

use super::common::{elapsed_seconds, error_result, file_name, file_size, PROCESSOR_VERSION};
use super::pdf::PdfProcessor;

const NAME: &str = "OfficeProcessor";
const SUPPORTED_EXTENSIONS: &[&str] = &[".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx"];
const CONVERTER_BINARY: &str = "libreoffice";

pub struct OfficeProcessor {
    converter_timeout: Duration,
    pdf_processor: PdfProcessor,
}

impl OfficeProcessor {
    pub fn new(converter_timeout: Duration) -> Self {
        Self {
            converter_timeout,
            pdf_processor: PdfProcessor::new(),
        }
    }

    /// Read a PPTX's embedded slide-1 thumbnail straight from the zip
    /// archive, avoiding a full LibreOffice round-trip when possible.
    fn pptx_embedded_thumbnail(&self, path: &Path) -> Option<Vec<u8>> {
        let file = std::fs::File::open(path).ok()?;
        let mut archive = zip::ZipArchive::new(file).ok()?;
        for candidate in ["docProps/thumbnail.jpeg", "docProps/thumbnail.png"] {
            if let Ok(mut entry) = archive.by_name(candidate) {
                let mut buf = Vec::new();
                if entry.read_to_end(&mut buf).is_ok() {
                    return Some(buf);
                }
            }
        }
        None
    }

    fn convert_to_pdf(&self, path: &Path) -> Result<PathBuf, String> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| e.to_string())?;
        let output_dir = temp_dir.keep();

        let status = std::process::Command::new(CONVERTER_BINARY)
            .args(["--headless", "--convert-to", "pdf", "--outdir"])
            .arg(&output_dir)
            .arg(path)
            .status();

        match status {
            Ok(s) if s.success() => {
                let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("converted");
                let candidate = output_dir.join(format!("{stem}.pdf"));
                if candidate.exists() {
                    Ok(candidate)
                } else {
                    Err("converter reported success but produced no PDF".to_string())
                }
            }
            Ok(_) => Err("office-to-pdf converter exited non-zero".to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(format!("{CONVERTER_BINARY} not found"))
            }
            Err(e) => Err(e.to_string()),
        }
    }
}

#[async_trait]
impl Processor for OfficeProcessor {
    fn can_process(&self, path: &Path) -> bool {
        SUPPORTED_EXTENSIONS.contains(&lowercase_extension(path).as_str())
    }

    async fn process(&self, path: &Path, original_key: &str) -> ProcessingResult {
        let start = Instant::now();
        let size = file_size(path);

        if size > MAX_OFFICE_BYTES {
            return error_result(
                NAME,
                path,
                original_key,
                format!("file too large: {size} bytes (max {MAX_OFFICE_BYTES})"),
            );
        }

        let extension = lowercase_extension(path);
        let pptx_thumbnail = if extension == ".pptx" {
            self.pptx_embedded_thumbnail(path)
        } else {
            None
        };

        let path_owned = path.to_path_buf();
        let timeout = self.converter_timeout;
        let conversion = tokio::time::timeout(
            timeout,
            tokio::task::spawn_blocking({
                let converter_path = path_owned.clone();
                move || {
                    let processor = OfficeProcessor::new(Duration::from_secs(180));
                    processor.convert_to_pdf(&converter_path)
                }
            }),
        )
        .await;

        let pdf_path = match conversion {
            Ok(Ok(Ok(p))) => p,
            Ok(Ok(Err(e))) => return error_result(NAME, path, original_key, e),
            Ok(Err(e)) => return error_result(NAME, path, original_key, format!("conversion task panicked: {e}")),
            Err(_) => return error_result(NAME, path, original_key, "office-to-PDF conversion timed out"),
        };

        let mut result = self.pdf_processor.process(&pdf_path, original_key).await;
        result.file_name = file_name(path, original_key);
        result.file_size = size;
        result.file_type = extension;
        result.processor_name = NAME.to_string();
        result.processor_version = PROCESSOR_VERSION.to_string();
        if let Some(bytes) = pptx_thumbnail {
            result.thumbnail_bytes = Some(bytes);
            result.thumbnail_format = Some("JPEG".to_string());
        }
        result.processing_time_seconds = elapsed_seconds(start);

        let _ = std::fs::remove_file(&pdf_path);
        result
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
