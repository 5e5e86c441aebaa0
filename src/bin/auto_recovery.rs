//! Long-running companion to `health-check`: polls the same liveness logic
//! on an interval and, after three consecutive unhealthy checks, restarts
//! the configured service via `systemctl`.

use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use fileindex_worker::broker::SqsBroker;
use fileindex_worker::config::Config;
use fileindex_worker::health::{HealthMonitor, HealthStatus};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "auto-recovery", about = "Watch worker health and restart on sustained failure")]
struct Args {
    #[arg(long, default_value_t = 60)]
    check_interval: u64,

    /// Queue backlog size that counts as unhealthy.
    #[arg(long, default_value_t = 1000)]
    stuck_threshold: u64,

    /// Memory high-water mark, in percent, that counts as degraded.
    #[arg(long, default_value_t = 90.0)]
    memory_threshold: f32,

    /// systemd unit to restart after three consecutive failures. Without
    /// this, failures are logged but no restart is attempted.
    #[arg(long)]
    service_name: Option<String>,
}

const CONSECUTIVE_FAILURES_BEFORE_RESTART: u32 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let config = Config::from_env()?;
    fileindex_worker::init_tracing(&format!("fileindex_worker={}", config.logging.level));

    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.aws.region.clone()))
        .load()
        .await;
    let sqs_client = aws_sdk_sqs::Client::new(&aws_config);
    let broker = Arc::new(SqsBroker::new(sqs_client, config.aws.queue_url.clone(), config.aws.dlq_queue_url.clone()));

    let monitor = HealthMonitor::new(broker, args.memory_threshold, args.stuck_threshold);

    let mut consecutive_failures = 0u32;
    loop {
        let report = monitor.check().await;
        match report.status {
            HealthStatus::Healthy => {
                if consecutive_failures > 0 {
                    info!("recovered after {consecutive_failures} consecutive failures");
                }
                consecutive_failures = 0;
            }
            HealthStatus::Degraded => {
                warn!(reasons = ?report.reasons, "degraded health check");
            }
            HealthStatus::Unhealthy => {
                consecutive_failures += 1;
                warn!(
                    consecutive_failures,
                    reasons = ?report.reasons,
                    "unhealthy health check"
                );
                if consecutive_failures >= CONSECUTIVE_FAILURES_BEFORE_RESTART {
                    restart_service(args.service_name.as_deref());
                    consecutive_failures = 0;
                }
            }
        }

        tokio::time::sleep(Duration::from_secs(args.check_interval)).await;
    }
}

fn restart_service(service_name: Option<&str>) {
    let Some(service_name) = service_name else {
        warn!("health check failed 3 times in a row but no --service-name was configured; not restarting anything");
        return;
    };

    info!(service = service_name, "restarting service after sustained health failures");
    match Command::new("systemctl").args(["restart", service_name]).status() {
        Ok(status) if status.success() => info!(service = service_name, "restart succeeded"),
        Ok(status) => error!(service = service_name, code = ?status.code(), "restart command exited non-zero"),
        Err(e) => error!(service = service_name, error = %e, "failed to invoke systemctl"),
    }
}
