//! Triages the dead-letter queue: classifies each stuck message and either
//! replays it onto the primary queue, archives it to cold storage, or
//! leaves it alone if it hasn't aged past the minimum triage window yet.

use std::sync::Arc;

use clap::Parser;
use fileindex_worker::broker::{derive_dlq_url, Broker, SqsBroker};
use fileindex_worker::config::Config;
use fileindex_worker::dlq::{DlqTriage, DlqTriagePolicy};
use fileindex_worker::object_store::S3ObjectStore;
use std::collections::HashMap;

#[derive(Parser, Debug)]
#[command(name = "dlq-reprocessor", about = "Triage and replay dead-lettered messages")]
struct Args {
    /// Report what would happen without replaying or archiving anything.
    #[arg(long)]
    dry_run: bool,

    /// Sample and classify messages without consuming them from the queue.
    #[arg(long)]
    analyze_only: bool,

    #[arg(long, default_value_t = 10)]
    max_messages: u32,

    /// Apply the triage policy unattended. Without this, runs are analysis-only.
    #[arg(long)]
    auto: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let config = Config::from_env()?;
    fileindex_worker::init_tracing(&format!("fileindex_worker={}", config.logging.level));

    let dlq_url = config
        .aws
        .dlq_queue_url
        .clone()
        .unwrap_or_else(|| derive_dlq_url(&config.aws.queue_url));

    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.aws.region.clone()))
        .load()
        .await;
    let sqs_client = aws_sdk_sqs::Client::new(&aws_config);
    let s3_client = aws_sdk_s3::Client::new(&aws_config);

    let broker: Arc<dyn Broker> = Arc::new(SqsBroker::new(sqs_client, dlq_url, None));
    let object_store = Arc::new(S3ObjectStore::new(s3_client));

    let policy = DlqTriagePolicy {
        min_age: chrono::Duration::seconds(config.dlq.min_age_seconds as i64),
        max_retries: config.dlq.max_retries,
    };

    if args.analyze_only {
        analyze(&broker, &policy, args.max_messages).await?;
        return Ok(());
    }

    // Real mutation (replay/archive/delete) only happens when `--auto` is
    // passed and `--dry-run` isn't; otherwise this is a preview run.
    let dry_run = args.dry_run || !args.auto;
    let triage = DlqTriage::new(broker, object_store, config.aws.dlq_archive_bucket.clone(), policy);
    let summary = triage.run(args.max_messages, dry_run).await?;

    println!(
        "replayed={} archived={} skipped={} (dry_run={dry_run})",
        summary.replayed, summary.archived, summary.skipped
    );
    Ok(())
}

/// Sample messages with a zero-second visibility timeout so they stay
/// visible to the real queue consumer, classify each, and report counts
/// without replaying, archiving, or deleting anything.
async fn analyze(broker: &Arc<dyn Broker>, policy: &DlqTriagePolicy, max_messages: u32) -> anyhow::Result<()> {
    use fileindex_worker::dlq::TriageVerdict;

    let now = chrono::Utc::now();
    let batch = broker.receive_batch(max_messages, 1, 0).await?;

    let mut counts: HashMap<&str, u32> = HashMap::new();
    for message in &batch {
        let verdict = policy.classify(message, now);
        let label = match verdict {
            TriageVerdict::Replay => "replay",
            TriageVerdict::Archive => "archive",
            TriageVerdict::Skip => "skip",
        };
        *counts.entry(label).or_insert(0) += 1;
    }

    println!("sampled {} messages", batch.len());
    for label in ["replay", "archive", "skip"] {
        println!("  {label}: {}", counts.get(label).copied().unwrap_or(0));
    }
    Ok(())
}
