//! Processor registry: route a downloaded file to a format-specific
//! processor and normalise its output.
//!
//! Generalises the reference crate's "try several OCR backends" shape
//! (`OcrBackend`/`OcrManager`) from "race several options" to "route to
//! exactly one by extension".

pub mod processors;

use std::path::Path;

use async_trait::async_trait;

use crate::model::ProcessingResult;

/// Default per-type size caps, in bytes.
pub const MAX_IMAGE_BYTES: u64 = 50 * 1024 * 1024;
pub const MAX_PDF_BYTES: u64 = 500 * 1024 * 1024;
pub const MAX_OFFICE_BYTES: u64 = 200 * 1024 * 1024;

/// Capability interface every format-specific processor implements.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Whether this processor claims the given (already-downloaded) file,
    /// judged by extension.
    fn can_process(&self, path: &Path) -> bool;

    /// Extract text/metadata/thumbnail. Must enforce its own size/time caps
    /// and report overflow as a failed [`ProcessingResult`] rather than
    /// panicking or propagating a raw I/O error.
    async fn process(&self, path: &Path, original_key: &str) -> ProcessingResult;

    fn name(&self) -> &'static str;
}

/// Holds processors in priority order; `route` returns the first match.
pub struct ProcessorRegistry {
    processors: Vec<Box<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new(processors: Vec<Box<dyn Processor>>) -> Self {
        Self { processors }
    }

    pub fn route(&self, path: &Path) -> Option<&dyn Processor> {
        self.processors
            .iter()
            .map(|p| p.as_ref())
            .find(|p| p.can_process(path))
    }
}

/// Lowercase extension including the leading dot, or empty string if none.
pub fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct AlwaysTrue;

    #[async_trait]
    impl Processor for AlwaysTrue {
        fn can_process(&self, _path: &Path) -> bool {
            true
        }
        async fn process(&self, _path: &Path, _original_key: &str) -> ProcessingResult {
            ProcessingResult::default()
        }
        fn name(&self) -> &'static str {
            "always-true"
        }
    }

    struct NeverTrue;

    #[async_trait]
    impl Processor for NeverTrue {
        fn can_process(&self, _path: &Path) -> bool {
            false
        }
        async fn process(&self, _path: &Path, _original_key: &str) -> ProcessingResult {
            ProcessingResult::default()
        }
        fn name(&self) -> &'static str {
            "never-true"
        }
    }

    #[test]
    fn route_returns_first_match_in_priority_order() {
        let registry = ProcessorRegistry::new(vec![Box::new(NeverTrue), Box::new(AlwaysTrue)]);
        let route = registry.route(&PathBuf::from("foo.pdf"));
        assert_eq!(route.unwrap().name(), "always-true");
    }

    #[test]
    fn route_returns_none_when_nothing_matches() {
        let registry = ProcessorRegistry::new(vec![Box::new(NeverTrue)]);
        assert!(registry.route(&PathBuf::from("foo.pdf")).is_none());
    }

    #[test]
    fn lowercase_extension_includes_dot() {
        assert_eq!(lowercase_extension(&PathBuf::from("Report.PDF")), ".pdf");
        assert_eq!(lowercase_extension(&PathBuf::from("noext")), "");
    }
}
