//! Backfill embeddings for documents that have a thumbnail but no
//! `imageVector` yet — typically because embedding generation was
//! disabled at ingest time and has since been turned on.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use crate::enrichment::embedding::EmbeddingClient;
use crate::index::IndexGateway;

use super::{run_scan, ScanSummary};

fn missing_vector_query() -> serde_json::Value {
    json!({
        "bool": {
            "must": [{"exists": {"field": "thumbnailUrl"}}],
            "must_not": [{"exists": {"field": "imageVector"}}]
        }
    })
}

pub async fn backfill_missing_vectors(
    index: Arc<dyn IndexGateway>,
    embeddings: Arc<EmbeddingClient>,
    expected_dimension: usize,
    page_size: u32,
    checkpoint_path: Option<&Path>,
    dry_run: bool,
) -> ScanSummary {
    // Collect candidates first: `run_scan`'s handler is synchronous, and the
    // embedding call is not, so the async step happens per hit before the
    // synchronous closure below reports back whether a patch resulted.
    let candidates = std::sync::Mutex::new(Vec::<(String, Option<serde_json::Value>)>::new());

    let summary = run_scan(index.clone(), missing_vector_query(), page_size, checkpoint_path, true, |hit| {
        let thumbnail_url = hit
            .source
            .get("thumbnailUrl")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        candidates.lock().unwrap().push((hit.id.clone(), thumbnail_url.map(serde_json::Value::String)));
        Ok(None)
    })
    .await;

    let candidates = candidates.into_inner().unwrap();
    let mut patched = 0u64;
    let mut failed = 0u64;

    for (doc_id, thumbnail_url) in candidates {
        let Some(serde_json::Value::String(url)) = thumbnail_url else {
            continue;
        };
        match embeddings.generate(&url, Some(expected_dimension)).await {
            Some(result) => {
                if !dry_run {
                    let patch = json!({
                        "imageVector": result.vector,
                        "vectorDimension": result.dimension as u32,
                        "vectorModel": "image-embedding-v1",
                    });
                    if let Err(e) = index.update_document(&doc_id, &patch).await {
                        tracing::warn!(doc_id = %doc_id, error = %e, "failed to write backfilled vector");
                        failed += 1;
                        continue;
                    }
                }
                patched += 1;
            }
            None => failed += 1,
        }
    }

    if !dry_run {
        if let Err(e) = index.refresh().await {
            tracing::warn!(error = %e, "failed to refresh index after vector backfill");
        }
    }

    ScanSummary {
        scanned: summary.scanned,
        patched,
        skipped: summary.scanned.saturating_sub(patched + failed),
        failed,
    }
}
