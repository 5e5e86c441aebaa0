//! Primary ingestion worker: drains the main queue, routes each file to a
//! processor, enriches, and indexes.

use std::sync::Arc;

use clap::Parser;
use fileindex_worker::broker::SqsBroker;
use fileindex_worker::config::Config;
use fileindex_worker::index::{IndexGateway, OpenSearchIndexGateway};
use fileindex_worker::object_store::S3ObjectStore;
use fileindex_worker::processor::processors::{
    DocuworksProcessor, ImageProcessor, MetadataOnlyProcessor, OfficeProcessor, PdfProcessor,
};
use fileindex_worker::processor::ProcessorRegistry;
use fileindex_worker::worker_runtime::WorkerRuntime;

#[derive(Parser, Debug)]
#[command(name = "worker", about = "Queue-driven file ingestion worker")]
struct Args {
    /// Load configuration and exit without starting the run loop.
    #[arg(long)]
    validate_only: bool,

    /// Create the search index (if missing) and exit.
    #[arg(long)]
    create_index: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let config = Config::from_env()?;
    fileindex_worker::init_tracing(&format!("fileindex_worker={}", config.logging.level));
    config.print_summary();

    if args.validate_only {
        println!("configuration is valid");
        return Ok(());
    }

    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.aws.region.clone()))
        .load()
        .await;

    let s3_client = aws_sdk_s3::Client::new(&aws_config);
    let sqs_client = aws_sdk_sqs::Client::new(&aws_config);

    let broker = Arc::new(SqsBroker::new(
        sqs_client,
        config.aws.queue_url.clone(),
        config.aws.dlq_queue_url.clone(),
    ));
    let object_store = Arc::new(S3ObjectStore::new(s3_client));
    let index: Arc<dyn IndexGateway> = Arc::new(OpenSearchIndexGateway::new(
        config.aws.opensearch_endpoint.clone(),
        config.aws.opensearch_index.clone(),
        512,
    ));

    if args.create_index {
        index.ensure_index().await?;
        println!("index ensured: {}", config.aws.opensearch_index);
        return Ok(());
    }
    index.ensure_index().await?;

    let registry = ProcessorRegistry::new(vec![
        Box::new(ImageProcessor::new(true)),
        Box::new(PdfProcessor::new()),
        Box::new(OfficeProcessor::new(config.processing.converter_timeout)),
        Box::new(DocuworksProcessor::default()),
        Box::new(MetadataOnlyProcessor),
    ]);

    let runtime = Arc::new(WorkerRuntime::new(config, broker, object_store, registry, index));
    let shutdown = runtime.shutdown_flag();

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
    });

    let summary = runtime.run().await;
    tracing::info!(
        processed = summary.processed,
        indexed = summary.indexed,
        dropped_unsupported = summary.dropped_unsupported,
        sent_to_dlq = summary.sent_to_dlq,
        "worker loop exited"
    );

    Ok(())
}
