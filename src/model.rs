//! Wire and index data shapes shared by every component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single preview page uploaded alongside a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreviewPage {
    pub page: u32,
    #[serde(rename = "s3Key")]
    pub s3_key: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

/// Normalised file event, regardless of which upstream shape produced it.
///
/// Object-store notifications and scanner payloads both collapse into this
/// before anything downstream sees them.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    BucketNotification {
        bucket: String,
        key: String,
    },
    ScannerPayload {
        bucket: Option<String>,
        key: String,
        original_path: Option<String>,
    },
}

impl SourceEvent {
    pub fn bucket(&self, default_bucket: &str) -> String {
        match self {
            SourceEvent::BucketNotification { bucket, .. } => bucket.clone(),
            SourceEvent::ScannerPayload { bucket, .. } => {
                bucket.clone().unwrap_or_else(|| default_bucket.to_string())
            }
        }
    }

    pub fn raw_key(&self) -> &str {
        match self {
            SourceEvent::BucketNotification { key, .. } => key,
            SourceEvent::ScannerPayload { key, .. } => key,
        }
    }

    pub fn original_path(&self) -> Option<&str> {
        match self {
            SourceEvent::BucketNotification { .. } => None,
            SourceEvent::ScannerPayload { original_path, .. } => original_path.as_deref(),
        }
    }
}

/// Raw message body as received from an object-store notification, tolerant
/// of both shapes described by the queue payload contract.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawFileEvent {
    pub bucket: Option<String>,
    #[serde(alias = "s3Key")]
    pub key: Option<String>,
    #[serde(rename = "originalPath")]
    pub original_path: Option<String>,
}

impl RawFileEvent {
    /// Normalise into a [`SourceEvent`], URL-decoding the key.
    pub fn into_source_event(self) -> Result<SourceEvent, String> {
        let raw_key = self.key.ok_or_else(|| "event missing key/s3Key".to_string())?;
        let decoded = urlencoding::decode(&raw_key)
            .map_err(|e| format!("invalid percent-encoding in key: {e}"))?
            .into_owned();

        match self.bucket {
            Some(bucket) if self.original_path.is_none() => {
                Ok(SourceEvent::BucketNotification { bucket, key: decoded })
            }
            bucket => Ok(SourceEvent::ScannerPayload {
                bucket,
                key: decoded,
                original_path: self.original_path,
            }),
        }
    }
}

/// File type routed to the preview worker's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewFileType {
    Office,
    Docuworks,
    Pdf,
}

/// Preview-queue work item, produced by the backfill scanner or the
/// preview enqueuer CLI and consumed by the preview worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(rename = "taskType")]
    pub task_type: String,
    #[serde(rename = "fileType")]
    pub file_type: PreviewFileType,
    #[serde(rename = "fileId")]
    pub file_id: String,
    #[serde(rename = "docId")]
    pub doc_id: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "fileExtension")]
    pub file_extension: String,
    #[serde(rename = "s3Key")]
    pub s3_key: String,
    #[serde(rename = "enqueuedAt")]
    pub enqueued_at: DateTime<Utc>,
    pub priority: u8,
    #[serde(rename = "retryCount")]
    pub retry_count: u32,
    pub metadata: WorkItemMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItemMetadata {
    pub source: String,
    #[serde(rename = "batchId")]
    pub batch_id: String,
    pub reason: String,
}

/// `category` facet, derived from a NAS server mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Road,
    Structure,
}

impl Category {
    pub fn display_label(self) -> &'static str {
        match self {
            Category::Road => "道路",
            Category::Structure => "構造",
        }
    }
}

/// Path-derived fields attached to every indexed document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PathMetadata {
    pub category: Option<Category>,
    #[serde(rename = "categoryDisplay")]
    pub category_display: Option<String>,
    #[serde(rename = "nasServer")]
    pub nas_server: Option<String>,
    #[serde(rename = "rootFolder")]
    pub root_folder: Option<String>,
    #[serde(rename = "nasPath")]
    pub nas_path: Option<String>,
}

/// Processing status of an indexed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Processing,
    Completed,
    Error,
}

/// The full document written to the search cluster, keyed by `fileKey`
/// (the URL-decoded source object key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    // Identity
    #[serde(rename = "fileId")]
    pub file_id: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "fileKey")]
    pub file_key: String,
    pub bucket: String,
    #[serde(rename = "fileExtension")]
    pub file_extension: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(rename = "fileSize")]
    pub file_size: u64,

    // Temporal
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "modifiedAt", skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(rename = "indexedAt")]
    pub indexed_at: DateTime<Utc>,
    #[serde(rename = "processedAt")]
    pub processed_at: DateTime<Utc>,

    // Content
    #[serde(rename = "extractedText")]
    pub extracted_text: String,
    pub content: String,
    #[serde(rename = "pageCount", skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(rename = "wordCount")]
    pub word_count: u64,
    #[serde(rename = "charCount")]
    pub char_count: u64,

    // Path-derived metadata
    #[serde(flatten)]
    pub path_metadata: PathMetadata,

    // Artifacts
    #[serde(rename = "thumbnailUrl", skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(rename = "thumbnailS3Key", skip_serializing_if = "Option::is_none")]
    pub thumbnail_s3_key: Option<String>,
    #[serde(rename = "previewImages", skip_serializing_if = "Option::is_none")]
    pub preview_images: Option<Vec<PreviewPage>>,
    #[serde(rename = "totalPages", skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    #[serde(rename = "previewGeneratedAt", skip_serializing_if = "Option::is_none")]
    pub preview_generated_at: Option<DateTime<Utc>>,

    // Vector
    #[serde(rename = "imageVector", skip_serializing_if = "Option::is_none")]
    pub image_vector: Option<Vec<f32>>,
    #[serde(rename = "vectorDimension", skip_serializing_if = "Option::is_none")]
    pub vector_dimension: Option<u32>,
    #[serde(rename = "vectorModel", skip_serializing_if = "Option::is_none")]
    pub vector_model: Option<String>,
    #[serde(rename = "vectorUpdatedAt", skip_serializing_if = "Option::is_none")]
    pub vector_updated_at: Option<DateTime<Utc>>,

    // Text & OCR
    #[serde(rename = "ocrText", skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
    #[serde(rename = "ocrConfidence", skip_serializing_if = "Option::is_none")]
    pub ocr_confidence: Option<f32>,
    #[serde(rename = "ocrLanguage", skip_serializing_if = "Option::is_none")]
    pub ocr_language: Option<String>,

    // Status
    #[serde(rename = "processingStatus")]
    pub processing_status: ProcessingStatus,
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub success: bool,

    // Provenance
    #[serde(rename = "processorName")]
    pub processor_name: String,
    #[serde(rename = "processorVersion")]
    pub processor_version: String,
    #[serde(rename = "processingTimeSeconds")]
    pub processing_time_seconds: f64,
}

/// Normalised output of any [`crate::processor::Processor`] implementation.
#[derive(Debug, Clone, Default)]
pub struct ProcessingResult {
    pub success: bool,
    pub error_message: Option<String>,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub mime_type: String,
    pub extracted_text: String,
    pub page_count: Option<u32>,
    pub word_count: u64,
    pub char_count: u64,
    pub thumbnail_bytes: Option<Vec<u8>>,
    pub thumbnail_format: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub processor_name: String,
    pub processor_version: String,
    pub processing_time_seconds: f64,
    pub ocr_confidence: Option<f32>,
    pub ocr_language: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_display_labels_match_japanese_source() {
        assert_eq!(Category::Road.display_label(), "道路");
        assert_eq!(Category::Structure.display_label(), "構造");
    }

    #[test]
    fn raw_event_decodes_percent_encoded_key() {
        let raw = RawFileEvent {
            bucket: Some("ingest".to_string()),
            key: Some("documents/road/ts-server3/R06_JOB/%E5%9B%B3%E9%9D%A2.pdf".to_string()),
            original_path: None,
        };
        let event = raw.into_source_event().unwrap();
        assert_eq!(event.raw_key(), "documents/road/ts-server3/R06_JOB/図面.pdf");
    }

    #[test]
    fn raw_event_with_original_path_is_scanner_payload() {
        let raw = RawFileEvent {
            bucket: Some("ingest".to_string()),
            key: Some("documents/road/ts-server3/R06_JOB/report.pdf".to_string()),
            original_path: Some("\\\\ts-server3\\share\\R06_JOB\\report.pdf".to_string()),
        };
        let event = raw.into_source_event().unwrap();
        assert!(matches!(event, SourceEvent::ScannerPayload { .. }));
    }
}
