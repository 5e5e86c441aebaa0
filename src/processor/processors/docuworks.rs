//! DocuWorks processor (`.xdw`, `.xbd`): routes to an out-of-process
//! Windows converter reached through its own queue, then OCRs the
//! resulting PDF. The converter and its queue are external collaborators,
//! out of scope for this crate — this processor only emits the well-known
//! request shape and waits on the documented response contract.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::model::ProcessingResult;
use crate::processor::{lowercase_extension, Processor};

use super::common::{elapsed_seconds, error_result, file_name, file_size, PROCESSOR_VERSION};

const NAME: &str = "DocuworksProcessor";
const SUPPORTED_EXTENSIONS: &[&str] = &[".xdw", ".xbd"];

/// Minimal shape of the conversion-queue round trip. A full implementation
/// would publish to `ConversionQueue` and poll for the resulting PDF key;
/// the trait below is the seam a real queue client would implement.
#[async_trait]
pub trait ConversionQueueClient: Send + Sync {
    async fn convert(&self, input_path: &Path, timeout: Duration) -> Result<Vec<u8>, String>;
}

/// Stand-in client that always reports the converter as unavailable,
/// matching the explicit out-of-scope status of DocuWorks conversion.
pub struct UnavailableConversionQueue;

#[async_trait]
impl ConversionQueueClient for UnavailableConversionQueue {
    async fn convert(&self, _input_path: &Path, _timeout: Duration) -> Result<Vec<u8>, String> {
        Err("DocuWorks conversion queue is not configured in this deployment".to_string())
    }
}

pub struct DocuworksProcessor {
    conversion_timeout: Duration,
    queue: Box<dyn ConversionQueueClient>,
}

impl DocuworksProcessor {
    pub fn new(conversion_timeout: Duration, queue: Box<dyn ConversionQueueClient>) -> Self {
        Self {
            conversion_timeout,
            queue,
        }
    }
}

impl Default for DocuworksProcessor {
    fn default() -> Self {
        Self::new(Duration::from_secs(180), Box::new(UnavailableConversionQueue))
    }
}

#[async_trait]
impl Processor for DocuworksProcessor {
    fn can_process(&self, path: &Path) -> bool {
        SUPPORTED_EXTENSIONS.contains(&lowercase_extension(path).as_str())
    }

    async fn process(&self, path: &Path, original_key: &str) -> ProcessingResult {
        let start = Instant::now();
        let size = file_size(path);

        let pdf_bytes = match self.queue.convert(path, self.conversion_timeout).await {
            Ok(bytes) => bytes,
            Err(e) => return error_result(NAME, path, original_key, e),
        };

        let temp_pdf = match tempfile::Builder::new().suffix(".pdf").tempfile() {
            Ok(f) => f,
            Err(e) => return error_result(NAME, path, original_key, e.to_string()),
        };
        if let Err(e) = std::fs::write(temp_pdf.path(), &pdf_bytes) {
            return error_result(NAME, path, original_key, e.to_string());
        }

        let pdf_processor = super::pdf::PdfProcessor::new();
        let mut result = pdf_processor.process(temp_pdf.path(), original_key).await;
        result.file_name = file_name(path, original_key);
        result.file_size = size;
        result.file_type = lowercase_extension(path);
        result.processor_name = NAME.to_string();
        result.processor_version = PROCESSOR_VERSION.to_string();
        result.processing_time_seconds = elapsed_seconds(start);
        result
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
