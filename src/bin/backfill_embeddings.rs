//! One-shot scan that generates image embeddings for documents that have
//! a thumbnail but no vector yet (e.g. embedding generation was enabled
//! after those documents were first indexed).

use std::sync::Arc;

use clap::Parser;
use fileindex_worker::backfill::vectors::backfill_missing_vectors;
use fileindex_worker::config::Config;
use fileindex_worker::enrichment::embedding::EmbeddingClient;
use fileindex_worker::index::OpenSearchIndexGateway;

#[derive(Parser, Debug)]
#[command(name = "backfill-embeddings", about = "Backfill missing image embeddings")]
struct Args {
    #[arg(long)]
    dry_run: bool,

    #[arg(long, default_value_t = 200)]
    page_size: u32,

    #[arg(long, default_value_t = 512)]
    vector_dimension: usize,

    #[arg(long)]
    checkpoint_file: Option<std::path::PathBuf>,
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
        args.vector_dimension as u32,
    ));
    let embeddings = Arc::new(EmbeddingClient::new(
        config.thumbnail.image_embedding_lambda.clone(),
        config.processing.embedding_timeout,
    ));

    let summary = backfill_missing_vectors(
        index,
        embeddings,
        args.vector_dimension,
        args.page_size,
        args.checkpoint_file.as_deref(),
        args.dry_run,
    )
    .await;

    println!(
        "scanned={} patched={} skipped={} failed={}",
        summary.scanned, summary.patched, summary.skipped, summary.failed
    );
    Ok(())
}
