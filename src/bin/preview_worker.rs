//! Preview worker: drains the preview queue, renders each document's pages,
//! uploads them, and patches the indexed document with `previewImages`.
//! Exits cleanly once the queue has been empty for `--idle-timeout` seconds,
//! so it can run as a scale-to-zero job rather than a permanently-on service.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use clap::Parser;
use fileindex_worker::broker::{Broker, SqsBroker};
use fileindex_worker::config::Config;
use fileindex_worker::enrichment::artifacts::ArtifactUploader;
use fileindex_worker::index::{IndexGateway, OpenSearchIndexGateway};
use fileindex_worker::model::WorkItem;
use fileindex_worker::object_store::S3ObjectStore;
use fileindex_worker::preview::render_pages;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "preview-worker", about = "Render document preview pages from the preview queue")]
struct Args {
    /// Preview-queue URL override; defaults to `PREVIEW_QUEUE_URL` from config.
    #[arg(long)]
    queue_url: Option<String>,

    /// Bounded concurrency for page rendering; defaults to `MAX_WORKERS`.
    #[arg(long)]
    threads: Option<usize>,

    /// Exit once the queue has been empty for this many seconds.
    #[arg(long, default_value_t = 300)]
    idle_timeout: u64,

    /// Skip the configuration's fail-fast validation pass at startup.
    #[arg(long)]
    skip_validation: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let config = if args.skip_validation {
        Config::from_env_unchecked()?
    } else {
        Config::from_env()?
    };
    fileindex_worker::init_tracing(&format!("fileindex_worker={}", config.logging.level));

    let preview_queue_url = args
        .queue_url
        .clone()
        .or_else(|| config.aws.preview_queue_url.clone())
        .ok_or_else(|| anyhow::anyhow!("PREVIEW_QUEUE_URL is required to run the preview worker"))?;

    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.aws.region.clone()))
        .load()
        .await;

    let s3_client = aws_sdk_s3::Client::new(&aws_config);
    let sqs_client = aws_sdk_sqs::Client::new(&aws_config);

    let broker = Arc::new(SqsBroker::new(sqs_client, preview_queue_url, None));
    let object_store = Arc::new(S3ObjectStore::new(s3_client));
    let artifacts = Arc::new(ArtifactUploader::new(object_store.clone(), config.aws.thumbnail_bucket.clone()));
    let index: Arc<dyn IndexGateway> = Arc::new(OpenSearchIndexGateway::new(
        config.aws.opensearch_endpoint.clone(),
        config.aws.opensearch_index.clone(),
        512,
    ));

    let max_workers = args.threads.unwrap_or(config.processing.max_workers);
    let semaphore = Arc::new(Semaphore::new(max_workers));
    let idle_timeout = Duration::from_secs(args.idle_timeout);
    let mut idle_since = Instant::now();

    loop {
        let batch = broker
            .receive_batch(
                max_workers as u32,
                config.aws.sqs_wait_time_seconds,
                config.aws.sqs_visibility_timeout,
            )
            .await?;

        if batch.is_empty() {
            if idle_since.elapsed() >= idle_timeout {
                info!(idle_timeout_seconds = args.idle_timeout, "queue empty past idle timeout; exiting");
                break;
            }
            continue;
        }
        idle_since = Instant::now();

        let mut handles = Vec::with_capacity(batch.len());
        for message in batch {
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
            let object_store = object_store.clone();
            let artifacts = artifacts.clone();
            let config = config.clone();
            let index = index.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let item: Option<WorkItem> = match serde_json::from_str(&message.body) {
                    Ok(item) => Some(item),
                    Err(e) => {
                        warn!(error = %e, "malformed preview work item; dropping");
                        None
                    }
                };

                if let Some(item) = item {
                    match render_for_item(&item, &object_store, &artifacts, &config, &index).await {
                        Ok(()) => info!(doc_id = %item.doc_id, "preview generated"),
                        Err(e) => error!(doc_id = %item.doc_id, error = %e, "preview generation failed"),
                    }
                }

                message.receipt_handle
            }));
        }

        let mut receipt_handles = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(receipt_handle) => receipt_handles.push(receipt_handle),
                Err(e) => error!(error = %e, "preview render task panicked"),
            }
        }

        if !receipt_handles.is_empty() {
            broker.delete_batch(&receipt_handles).await?;
        }
    }

    Ok(())
}

async fn render_for_item(
    item: &WorkItem,
    object_store: &Arc<S3ObjectStore>,
    artifacts: &Arc<ArtifactUploader>,
    config: &Config,
    index: &Arc<dyn IndexGateway>,
) -> anyhow::Result<()> {
    use fileindex_worker::object_store::ObjectStore;

    let local_path = object_store
        .download(&config.aws.ingest_bucket, &item.s3_key, &config.processing.temp_dir)
        .await?;

    let pages = render_pages(&local_path, &config.preview)?;
    fileindex_worker::object_store::cleanup_temp_file(&local_path);

    let mut preview_pages = Vec::with_capacity(pages.len());
    for page in pages {
        let uploaded = artifacts
            .upload_preview_page(&item.file_id, page.page_number, page.jpeg_bytes, page.width, page.height)
            .await?;
        preview_pages.push(uploaded);
    }

    let patch = serde_json::json!({
        "previewImages": preview_pages,
        "totalPages": preview_pages.len() as u32,
        "previewGeneratedAt": Utc::now(),
    });
    index.update_document(&item.doc_id, &patch).await?;
    Ok(())
}
