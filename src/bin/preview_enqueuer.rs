//! One-shot scan that enqueues preview-generation work items for every
//! eligible document missing them. Run manually or on a schedule; supports
//! `--dry-run` to report what would be enqueued without publishing.

use std::sync::Arc;

use clap::{Parser, ValueEnum};
use fileindex_worker::backfill::previews::{count_missing_previews, enqueue_missing_previews};
use fileindex_worker::broker::SqsBroker;
use fileindex_worker::config::Config;
use fileindex_worker::index::OpenSearchIndexGateway;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FileTypeArg {
    Office,
    Docuworks,
    All,
}

impl FileTypeArg {
    fn as_query_str(self) -> Option<&'static str> {
        match self {
            FileTypeArg::Office => Some("office"),
            FileTypeArg::Docuworks => Some("docuworks"),
            FileTypeArg::All => None,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "preview-enqueuer", about = "Enqueue missing preview-generation work items")]
struct Args {
    /// Report what would be enqueued without publishing to the preview queue.
    #[arg(long)]
    dry_run: bool,

    #[arg(long, default_value_t = 200)]
    page_size: u32,

    #[arg(long)]
    checkpoint_file: Option<std::path::PathBuf>,

    /// Restrict the scan to one file-type family.
    #[arg(long, value_enum, default_value_t = FileTypeArg::All)]
    file_type: FileTypeArg,

    /// Stop after enqueuing this many work items.
    #[arg(long)]
    limit: Option<u64>,

    /// Report the number of matching documents and exit without scanning
    /// or enqueuing anything.
    #[arg(long)]
    count_only: bool,

    /// Preview-queue URL override; defaults to `PREVIEW_QUEUE_URL` from config.
    #[arg(long)]
    queue_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let config = Config::from_env()?;
    fileindex_worker::init_tracing(&format!("fileindex_worker={}", config.logging.level));

    let index = Arc::new(OpenSearchIndexGateway::new(
        config.aws.opensearch_endpoint.clone(),
        config.aws.opensearch_index.clone(),
        512,
    ));

    if args.count_only {
        let count = count_missing_previews(index, args.file_type.as_query_str()).await?;
        println!("matching={count}");
        return Ok(());
    }

    let preview_queue_url = args
        .queue_url
        .clone()
        .or_else(|| config.aws.preview_queue_url.clone())
        .ok_or_else(|| anyhow::anyhow!("PREVIEW_QUEUE_URL is required to enqueue previews"))?;

    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.aws.region.clone()))
        .load()
        .await;
    let sqs_client = aws_sdk_sqs::Client::new(&aws_config);

    let preview_broker = Arc::new(SqsBroker::new(sqs_client, preview_queue_url, None));

    let batch_id = format!("enqueuer-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S"));
    let summary = enqueue_missing_previews(
        index,
        preview_broker,
        args.page_size,
        args.checkpoint_file.as_deref(),
        batch_id,
        args.dry_run,
        args.file_type.as_query_str(),
        args.limit,
    )
    .await;

    println!(
        "scanned={} enqueued={} skipped={} failed={}",
        summary.scanned, summary.patched, summary.skipped, summary.failed
    );
    Ok(())
}
