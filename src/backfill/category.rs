//! Patches indexed documents that predate the category-correction rule,
//! or whose `category`/`nasServer` fields were never derived at all.
//! Grounded on the query-all/patch-if-missing shape of the reference
//! `fix_missing_category.py`/`reindex_with_category.py` scripts: find
//! documents missing category fields, recompute from the stored key, and
//! write back only the derived fields.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use crate::enrichment::path_metadata::extract_path_metadata;
use crate::index::IndexGateway;

use super::{run_scan, ScanSummary};

/// Query matching documents with no `category` field at all — the set this
/// backfill exists to repair.
fn missing_category_query() -> serde_json::Value {
    json!({
        "bool": {
            "must_not": [{"exists": {"field": "category"}}]
        }
    })
}

pub async fn backfill_missing_category(
    index: Arc<dyn IndexGateway>,
    page_size: u32,
    checkpoint_path: Option<&Path>,
    dry_run: bool,
) -> ScanSummary {
    run_scan(
        index,
        missing_category_query(),
        page_size,
        checkpoint_path,
        dry_run,
        |hit| {
            let key = hit
                .source
                .get("fileKey")
                .and_then(|v| v.as_str())
                .or_else(|| hit.source.get("filePath").and_then(|v| v.as_str()))
                .ok_or_else(|| "document has no fileKey/filePath to derive category from".to_string())?;

            let metadata = extract_path_metadata(key, None);
            if metadata.category.is_none() {
                return Ok(None);
            }

            Ok(Some(json!({
                "category": metadata.category,
                "categoryDisplay": metadata.category_display,
                "nasServer": metadata.nas_server,
                "rootFolder": metadata.root_folder,
                "nasPath": metadata.nas_path,
            })))
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndexGateway;
    use crate::model::{IndexedDocument, PathMetadata, ProcessingStatus};
    use chrono::Utc;

    fn doc_with_key(key: &str) -> IndexedDocument {
        IndexedDocument {
            file_id: key.to_string(),
            file_name: "report.pdf".to_string(),
            file_path: key.to_string(),
            file_key: key.to_string(),
            bucket: "bucket".to_string(),
            file_extension: ".pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            file_size: 10,
            created_at: None,
            modified_at: None,
            indexed_at: Utc::now(),
            processed_at: Utc::now(),
            extracted_text: String::new(),
            content: String::new(),
            page_count: None,
            word_count: 0,
            char_count: 0,
            path_metadata: PathMetadata::default(),
            thumbnail_url: None,
            thumbnail_s3_key: None,
            preview_images: None,
            total_pages: None,
            preview_generated_at: None,
            image_vector: None,
            vector_dimension: None,
            vector_model: None,
            vector_updated_at: None,
            ocr_text: None,
            ocr_confidence: None,
            ocr_language: None,
            processing_status: ProcessingStatus::Completed,
            error_message: None,
            success: true,
            processor_name: "test".to_string(),
            processor_version: "1.0.0".to_string(),
            processing_time_seconds: 0.0,
        }
    }

    #[tokio::test]
    async fn patches_documents_missing_category() {
        let index = Arc::new(MemoryIndexGateway::new());
        let key = "documents/road/ts-server6/R06_JOB/report.pdf";
        index.index_document(key, &doc_with_key(key)).await.unwrap();

        let summary = backfill_missing_category(index.clone(), 50, None, false).await;
        assert_eq!(summary.patched, 1);

        let stored = index.get(key).await.unwrap();
        // ts-server6 is a structure server, overriding the "road" path segment.
        assert_eq!(stored["category"], "structure");
    }
}
