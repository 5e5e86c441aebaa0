//! One-shot liveness probe, suitable for a container orchestrator's
//! healthcheck hook. Exits 0 (healthy), 1 (degraded), or 2 (unhealthy).

use std::process::ExitCode;
use std::sync::Arc;

use fileindex_worker::broker::SqsBroker;
use fileindex_worker::config::Config;
use fileindex_worker::health::HealthMonitor;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(2);
        }
    };
    fileindex_worker::init_tracing(&format!("fileindex_worker={}", config.logging.level));

    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.aws.region.clone()))
        .load()
        .await;
    let sqs_client = aws_sdk_sqs::Client::new(&aws_config);
    let broker = Arc::new(SqsBroker::new(sqs_client, config.aws.queue_url.clone(), config.aws.dlq_queue_url.clone()));

    let monitor = HealthMonitor::new(
        broker,
        config.processing.resource_memory_high_water_percent as f32,
        1000,
    );
    let report = monitor.check().await;

    println!("status: {:?}", report.status);
    if let Some(depth) = report.queue_depth {
        println!("queue depth: available={} in_flight={}", depth.available, depth.in_flight);
    }
    if let Some(sample) = report.resource_sample {
        println!("memory use: {:.1}%", sample.used_percent);
    }
    for reason in &report.reasons {
        println!("reason: {reason}");
    }

    ExitCode::from(report.exit_code() as u8)
}
