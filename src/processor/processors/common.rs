//! Shared helpers used by every built-in processor.

use std::path::Path;
use std::time::Instant;

use crate::model::ProcessingResult;

pub const PROCESSOR_VERSION: &str = "1.0.0";

pub fn count_words(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

pub fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

pub fn file_name(path: &Path, original_key: &str) -> String {
    // Identity fields always come from the original object key, never the
    // temp-file path it was downloaded to.
    Path::new(original_key)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path.to_str().unwrap_or("unknown"))
        .to_string()
}

pub fn error_result(processor_name: &'static str, path: &Path, original_key: &str, message: impl Into<String>) -> ProcessingResult {
    ProcessingResult {
        success: false,
        error_message: Some(message.into()),
        file_name: file_name(path, original_key),
        file_size: file_size(path),
        processor_name: processor_name.to_string(),
        processor_version: PROCESSOR_VERSION.to_string(),
        ..Default::default()
    }
}

pub fn elapsed_seconds(start: Instant) -> f64 {
    start.elapsed().as_secs_f64()
}
