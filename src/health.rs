//! Shared liveness logic for the `health-check` and `auto-recovery`
//! binaries, so the two can't silently drift on what "healthy" means.

use crate::broker::{Broker, QueueDepth};
use crate::resource::{ResourceMonitor, ResourceSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub queue_depth: Option<QueueDepth>,
    pub resource_sample: Option<ResourceSample>,
    pub reasons: Vec<String>,
}

impl HealthReport {
    /// Process exit code convention shared by both binaries: 0 healthy,
    /// 1 degraded (still making progress, flagged for attention), 2 unhealthy.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            HealthStatus::Healthy => 0,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 2,
        }
    }
}

pub struct HealthMonitor {
    broker: std::sync::Arc<dyn Broker>,
    resource_high_water_percent: f32,
    queue_depth_unhealthy_threshold: u64,
}

impl HealthMonitor {
    pub fn new(
        broker: std::sync::Arc<dyn Broker>,
        resource_high_water_percent: f32,
        queue_depth_unhealthy_threshold: u64,
    ) -> Self {
        Self {
            broker,
            resource_high_water_percent,
            queue_depth_unhealthy_threshold,
        }
    }

    pub async fn check(&self) -> HealthReport {
        let mut reasons = Vec::new();
        let mut status = HealthStatus::Healthy;

        let queue_depth = match self.broker.depth().await {
            Ok(depth) => {
                if depth.available >= self.queue_depth_unhealthy_threshold {
                    reasons.push(format!(
                        "queue backlog {} exceeds threshold {}",
                        depth.available, self.queue_depth_unhealthy_threshold
                    ));
                    status = HealthStatus::Unhealthy;
                }
                Some(depth)
            }
            Err(e) => {
                reasons.push(format!("broker depth check failed: {e}"));
                status = HealthStatus::Unhealthy;
                None
            }
        };

        let mut monitor = ResourceMonitor::new(self.resource_high_water_percent);
        let sample = monitor.sample();
        if sample.over_high_water(self.resource_high_water_percent) {
            reasons.push(format!(
                "memory use {:.1}% crossed high-water mark {:.1}%",
                sample.used_percent, self.resource_high_water_percent
            ));
            if status == HealthStatus::Healthy {
                status = HealthStatus::Degraded;
            }
        }

        HealthReport {
            status,
            queue_depth,
            resource_sample: Some(sample),
            reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;

    #[tokio::test]
    async fn empty_queue_and_normal_memory_is_healthy() {
        let broker = std::sync::Arc::new(MemoryBroker::new());
        let monitor = HealthMonitor::new(broker, 99.9, 1000);
        let report = monitor.check().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn backlog_over_threshold_is_unhealthy() {
        let broker = std::sync::Arc::new(MemoryBroker::new());
        for _ in 0..3 {
            broker.push("{}".to_string()).await;
        }
        let monitor = HealthMonitor::new(broker, 99.9, 2);
        let report = monitor.check().await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.exit_code(), 2);
    }
}
