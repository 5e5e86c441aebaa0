//! One-shot scan that recomputes `category`/`nasServer` fields for indexed
//! documents that predate the category-correction rule or never had them.

use std::sync::Arc;

use clap::Parser;
use fileindex_worker::backfill::category::backfill_missing_category;
use fileindex_worker::config::Config;
use fileindex_worker::index::OpenSearchIndexGateway;

#[derive(Parser, Debug)]
#[command(name = "backfill-category", about = "Backfill missing category metadata")]
struct Args {
    #[arg(long)]
    dry_run: bool,

    #[arg(long, default_value_t = 200)]
    page_size: u32,

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
        512,
    ));

    let summary = backfill_missing_category(
        index,
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
