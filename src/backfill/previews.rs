//! Scans the index for documents that should have rendered preview pages
//! but don't yet, and enqueues a [`WorkItem`] for each onto the preview
//! queue. Shared by the preview-enqueuer binary and the backfill sweep
//! that runs the same scan with `--dry-run`.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use serde_json::json;
use tracing::{info, warn};

use crate::broker::Broker;
use crate::index::IndexGateway;
use crate::model::{PreviewFileType, WorkItem, WorkItemMetadata};
use crate::state::CheckpointState;

use super::ScanSummary;

/// Extensions eligible for preview rendering, optionally narrowed to one
/// file-type family (`office`, `docuworks`). `None`/`"all"` matches every
/// eligible extension.
fn extensions_for_file_type(file_type: Option<&str>) -> &'static [&'static str] {
    match file_type {
        Some("office") => &[".doc", ".docx", ".ppt", ".pptx"],
        Some("docuworks") => &[".xdw", ".xbd"],
        Some("pdf") => &[".pdf"],
        _ => &[".pdf", ".doc", ".docx", ".ppt", ".pptx", ".xdw", ".xbd"],
    }
}

fn missing_preview_query(file_type: Option<&str>) -> serde_json::Value {
    json!({
        "bool": {
            "must": [{"terms": {"fileExtension": extensions_for_file_type(file_type)}}],
            "must_not": [{"exists": {"field": "previewImages"}}]
        }
    })
}

fn preview_file_type(extension: &str) -> Option<PreviewFileType> {
    match extension {
        ".pdf" => Some(PreviewFileType::Pdf),
        ".doc" | ".docx" | ".ppt" | ".pptx" => Some(PreviewFileType::Office),
        ".xdw" | ".xbd" => Some(PreviewFileType::Docuworks),
        _ => None,
    }
}

/// Counts documents matching the given file-type filter without scanning
/// or enqueuing anything, for `--count-only` runs.
pub async fn count_missing_previews(
    index: Arc<dyn IndexGateway>,
    file_type: Option<&str>,
) -> Result<u64, crate::index::IndexError> {
    index.count_by_query(&missing_preview_query(file_type)).await
}

pub async fn enqueue_missing_previews(
    index: Arc<dyn IndexGateway>,
    preview_broker: Arc<dyn Broker>,
    page_size: u32,
    checkpoint_path: Option<&Path>,
    batch_id: String,
    dry_run: bool,
    file_type: Option<&str>,
    limit: Option<u64>,
) -> ScanSummary {
    let mut checkpoint = checkpoint_path
        .map(CheckpointState::load)
        .transpose()
        .unwrap_or_else(|e| {
            warn!(error = %e, "failed to load checkpoint; starting fresh");
            None
        })
        .unwrap_or_default();

    let mut summary = ScanSummary::default();
    let mut stream = index.scroll(missing_preview_query(file_type), page_size);

    while let Some(hit) = stream.next().await {
        if let Some(limit) = limit {
            if summary.patched >= limit {
                break;
            }
        }

        let hit = match hit {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, "scroll page failed");
                summary.failed += 1;
                continue;
            }
        };

        summary.scanned += 1;
        if checkpoint.is_processed(&hit.id) {
            summary.skipped += 1;
            continue;
        }

        let extension = match hit.source.get("fileExtension").and_then(|v| v.as_str()) {
            Some(e) => e,
            None => {
                summary.skipped += 1;
                continue;
            }
        };
        let file_type = match preview_file_type(extension) {
            Some(t) => t,
            None => {
                summary.skipped += 1;
                continue;
            }
        };

        let work_item = WorkItem {
            task_type: "generate_preview".to_string(),
            file_type,
            file_id: hit.id.clone(),
            doc_id: hit.id.clone(),
            file_name: hit.source.get("fileName").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            file_path: hit.source.get("filePath").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            file_extension: extension.to_string(),
            s3_key: hit.source.get("fileKey").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            enqueued_at: Utc::now(),
            priority: 5,
            retry_count: 0,
            metadata: WorkItemMetadata {
                source: "backfill".to_string(),
                batch_id: batch_id.clone(),
                reason: "missing preview images".to_string(),
            },
        };

        info!(doc_id = %hit.id, dry_run, "enqueuing preview work item");

        if !dry_run {
            let body = match serde_json::to_string(&work_item) {
                Ok(b) => b,
                Err(e) => {
                    warn!(doc_id = %hit.id, error = %e, "failed to serialize preview work item");
                    summary.failed += 1;
                    continue;
                }
            };
            if let Err(e) = preview_broker.requeue(&body, std::collections::HashMap::new()).await {
                warn!(doc_id = %hit.id, error = %e, "failed to enqueue preview work item");
                summary.failed += 1;
                continue;
            }
        }

        summary.patched += 1;
        checkpoint.mark_processed(hit.id.clone());

        if let Some(path) = checkpoint_path {
            if summary.scanned % 200 == 0 {
                if let Err(e) = checkpoint.save(path) {
                    warn!(error = %e, "failed to persist checkpoint");
                }
            }
        }
    }

    if let Some(path) = checkpoint_path {
        if let Err(e) = checkpoint.save(path) {
            warn!(error = %e, "failed to persist final checkpoint");
        }
    }

    if !dry_run {
        if let Err(e) = index.refresh().await {
            warn!(error = %e, "failed to refresh index after preview backfill scan");
        }
    }

    info!(
        scanned = summary.scanned,
        enqueued = summary.patched,
        skipped = summary.skipped,
        failed = summary.failed,
        dry_run,
        "preview backfill scan complete"
    );

    summary
}
