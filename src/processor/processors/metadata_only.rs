//! Metadata-only processor: formats that are never text-extractable (CAD,
//! archives, media, executables). Emits an empty-text success result with
//! only identity metadata — still indexed, per the routing policy.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;

use crate::model::ProcessingResult;
use crate::processor::{lowercase_extension, Processor};

use super::common::{elapsed_seconds, file_name, file_size, PROCESSOR_VERSION};

const NAME: &str = "MetadataOnlyProcessor";

/// This processor is the catch-all fallback; it claims any extension the
/// caller explicitly decides is metadata-only (CAD/archive/media/binary),
/// so it is registered last and only reached when an earlier processor
/// didn't match.
// CAD formats (.dwg, .dxf) are deliberately excluded: they are the
// canonical "unsupported format" case, claimed by no processor so the
// worker runtime drops the message without an index write.
const METADATA_ONLY_EXTENSIONS: &[&str] = &[
    ".zip", ".rar", ".7z", ".mp4", ".mp3", ".wav", ".avi", ".exe", ".dll", ".bin",
];

pub struct MetadataOnlyProcessor;

#[async_trait]
impl Processor for MetadataOnlyProcessor {
    fn can_process(&self, path: &Path) -> bool {
        METADATA_ONLY_EXTENSIONS.contains(&lowercase_extension(path).as_str())
    }

    async fn process(&self, path: &Path, original_key: &str) -> ProcessingResult {
        let start = Instant::now();
        ProcessingResult {
            success: true,
            error_message: None,
            file_name: file_name(path, original_key),
            file_size: file_size(path),
            file_type: lowercase_extension(path),
            mime_type: infer::get_from_path(path)
                .ok()
                .flatten()
                .map(|t| t.mime_type().to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            extracted_text: String::new(),
            word_count: 0,
            char_count: 0,
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
    fn claims_known_non_extractable_extensions() {
        let processor = MetadataOnlyProcessor;
        assert!(processor.can_process(&PathBuf::from("archive.zip")));
        assert!(!processor.can_process(&PathBuf::from("report.pdf")));
    }

    #[test]
    fn does_not_claim_unsupported_cad_formats() {
        let processor = MetadataOnlyProcessor;
        assert!(!processor.can_process(&PathBuf::from("drawing.dwg")));
        assert!(!processor.can_process(&PathBuf::from("drawing.dxf")));
    }
}
