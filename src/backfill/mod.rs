//! Backfill scanners: one-shot (or resumable) sweeps over the already
//! indexed corpus that patch documents missing a field the ingest path
//! now populates. Each mode shares the scroll-and-patch skeleton; only
//! the classification/patch step differs.

pub mod category;
pub mod previews;
pub mod vectors;

use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tracing::{info, warn};

use crate::index::{IndexGateway, SearchHit};
use crate::state::CheckpointState;

#[derive(Debug, Default, Clone, Copy)]
pub struct ScanSummary {
    pub scanned: u64,
    pub patched: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Drive `index.scroll(query, page_size)`, handing every hit not already in
/// the checkpoint to `handler`. `handler` returns `Ok(Some(patch))` to write
/// a partial update, `Ok(None)` to skip without patching, `Err` to count a
/// failure without aborting the scan.
pub async fn run_scan<F>(
    index: Arc<dyn IndexGateway>,
    query: Value,
    page_size: u32,
    checkpoint_path: Option<&Path>,
    dry_run: bool,
    mut handler: F,
) -> ScanSummary
where
    F: FnMut(&SearchHit) -> Result<Option<Value>, String>,
{
    let mut checkpoint = checkpoint_path
        .map(CheckpointState::load)
        .transpose()
        .unwrap_or_else(|e| {
            warn!(error = %e, "failed to load checkpoint; starting fresh");
            None
        })
        .unwrap_or_default();

    let mut summary = ScanSummary::default();
    let mut stream = index.scroll(query, page_size);

    while let Some(hit) = stream.next().await {
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

        match handler(&hit) {
            Ok(Some(patch)) => {
                summary.patched += 1;
                if !dry_run {
                    if let Err(e) = index.update_document(&hit.id, &patch).await {
                        warn!(doc_id = %hit.id, error = %e, "failed to apply backfill patch");
                        summary.failed += 1;
                        continue;
                    }
                }
                checkpoint.mark_processed(hit.id.clone());
            }
            Ok(None) => {
                summary.skipped += 1;
                checkpoint.mark_processed(hit.id.clone());
            }
            Err(e) => {
                warn!(doc_id = %hit.id, error = %e, "backfill handler failed");
                summary.failed += 1;
            }
        }

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
            warn!(error = %e, "failed to refresh index after backfill scan");
        }
    }

    info!(
        scanned = summary.scanned,
        patched = summary.patched,
        skipped = summary.skipped,
        failed = summary.failed,
        dry_run,
        "backfill scan complete"
    );

    summary
}
