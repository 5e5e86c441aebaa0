//! Shared error classification used by the worker runtime and DLQ triage.
//!
//! One enum, two call sites: the worker consults [`ProcessingError::retryable`]
//! to decide DLQ-or-drop, and DLQ triage consults [`ProcessingError::category`]
//! to decide replay-or-archive. Neither classification is duplicated.

use thiserror::Error;

/// The coarse bucket a failure falls into for DLQ replay policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network/timeout/throttling/transient backend trouble. Safe to replay.
    Recoverable,
    /// Bad input that will never succeed on replay.
    Unrecoverable,
    /// Couldn't classify; treated as recoverable at the lowest priority.
    Unknown,
}

/// Classified failure produced anywhere in the processing pipeline.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("source object not found: {0}")]
    NotFound(String),

    #[error("corrupt input: {0}")]
    CorruptInput(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("resource exhausted: {0}")]
    ResourceExhaustion(String),

    #[error("search index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("processing failure: {0}")]
    ProcessingFailure(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl ProcessingError {
    /// Whether the worker runtime should hand this message to the DLQ for
    /// later replay (`true`) or drop/archive it without retrying (`false`).
    ///
    /// `UnsupportedFormat` is the one variant that is neither retried nor
    /// DLQ'd at all — callers must special-case it before consulting this
    /// method (it acks-and-drops instead).
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            ProcessingError::Timeout(_)
                | ProcessingError::Network(_)
                | ProcessingError::Throttled(_)
                | ProcessingError::ResourceExhaustion(_)
                | ProcessingError::IndexUnavailable(_)
                | ProcessingError::ProcessingFailure(_)
                | ProcessingError::Unknown(_)
        )
    }

    /// The DLQ-triage classification for this error kind.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProcessingError::UnsupportedFormat(_)
            | ProcessingError::Permission(_)
            | ProcessingError::NotFound(_)
            | ProcessingError::CorruptInput(_)
            | ProcessingError::Validation(_) => ErrorCategory::Unrecoverable,

            ProcessingError::Timeout(_)
            | ProcessingError::Network(_)
            | ProcessingError::Throttled(_)
            | ProcessingError::ResourceExhaustion(_)
            | ProcessingError::IndexUnavailable(_)
            | ProcessingError::ProcessingFailure(_) => ErrorCategory::Recoverable,

            ProcessingError::Unknown(_) => ErrorCategory::Unknown,
        }
    }

    /// Short machine-readable name, used as the DLQ `ErrorMessage` prefix and
    /// in structured log fields.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ProcessingError::UnsupportedFormat(_) => "UnsupportedFormat",
            ProcessingError::Permission(_) => "Permission",
            ProcessingError::NotFound(_) => "NotFound",
            ProcessingError::CorruptInput(_) => "CorruptInput",
            ProcessingError::Validation(_) => "Validation",
            ProcessingError::Timeout(_) => "Timeout",
            ProcessingError::Network(_) => "Network",
            ProcessingError::Throttled(_) => "Throttled",
            ProcessingError::ResourceExhaustion(_) => "ResourceExhaustion",
            ProcessingError::IndexUnavailable(_) => "IndexUnavailable",
            ProcessingError::ProcessingFailure(_) => "ProcessingFailure",
            ProcessingError::Unknown(_) => "Unknown",
        }
    }

    /// Classify a free-text DLQ `ErrorMessage` attribute back into a category.
    /// Ported from the substring-matching approach in the reprocessor/analyzer
    /// scripts this system's DLQ triage descends from.
    pub fn classify_message(message: &str) -> ErrorCategory {
        let lower = message.to_lowercase();

        const UNRECOVERABLE_MARKERS: &[&str] = &[
            "unsupportedformat",
            "unsupported format",
            "notfound",
            "not found",
            "permission",
            "corruptinput",
            "corrupt",
            "validation",
        ];
        const RECOVERABLE_MARKERS: &[&str] = &[
            "timeout",
            "network",
            "throttl",
            "resourceexhaustion",
            "memory",
            "disk",
            "indexunavailable",
            "opensearch",
            "connection",
            "processingfailure",
        ];

        if UNRECOVERABLE_MARKERS.iter().any(|m| lower.contains(m)) {
            ErrorCategory::Unrecoverable
        } else if RECOVERABLE_MARKERS.iter().any(|m| lower.contains(m)) {
            ErrorCategory::Recoverable
        } else {
            ErrorCategory::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_is_not_retryable() {
        let err = ProcessingError::UnsupportedFormat("dwg".into());
        assert!(!err.retryable());
        assert_eq!(err.category(), ErrorCategory::Unrecoverable);
    }

    #[test]
    fn index_unavailable_is_retryable_and_recoverable() {
        let err = ProcessingError::IndexUnavailable("connection refused".into());
        assert!(err.retryable());
        assert_eq!(err.category(), ErrorCategory::Recoverable);
    }

    #[test]
    fn classify_message_recognises_opensearch_failures() {
        assert_eq!(
            ProcessingError::classify_message("OpenSearch connection timed out"),
            ErrorCategory::Recoverable
        );
    }

    #[test]
    fn classify_message_recognises_unsupported_format() {
        assert_eq!(
            ProcessingError::classify_message("UnsupportedFormat: .dwg"),
            ErrorCategory::Unrecoverable
        );
    }

    #[test]
    fn classify_message_falls_back_to_unknown() {
        assert_eq!(
            ProcessingError::classify_message("something bizarre happened"),
            ErrorCategory::Unknown
        );
    }
}
