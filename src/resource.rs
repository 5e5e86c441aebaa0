//! Resource guardrail: samples this process's memory footprint so the
//! worker runtime can shrink its batch size (or refuse new work) before
//! the host's memory ceiling is hit, and so the health monitor can report
//! on it independently.

use sysinfo::{Pid, System};
use tracing::warn;

pub struct ResourceMonitor {
    system: System,
    pid: Pid,
    high_water_percent: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct ResourceSample {
    pub rss_bytes: u64,
    pub total_memory_bytes: u64,
    pub used_percent: f32,
}

impl ResourceSample {
    pub fn over_high_water(&self, high_water_percent: f32) -> bool {
        self.used_percent >= high_water_percent
    }
}

impl ResourceMonitor {
    pub fn new(high_water_percent: f32) -> Self {
        let pid = Pid::from_u32(std::process::id());
        let mut system = System::new();
        system.refresh_memory();
        Self {
            system,
            pid,
            high_water_percent,
        }
    }

    /// Re-read this process's RSS and overall memory use. Cheap enough to
    /// call every N processed messages rather than on a timer.
    pub fn sample(&mut self) -> ResourceSample {
        self.system.refresh_memory();
        self.system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[self.pid]), true);

        let rss_bytes = self
            .system
            .process(self.pid)
            .map(|p| p.memory())
            .unwrap_or(0);
        let total_memory_bytes = self.system.total_memory();
        let used_percent = if total_memory_bytes == 0 {
            0.0
        } else {
            (rss_bytes as f32 / total_memory_bytes as f32) * 100.0
        };

        let sample = ResourceSample {
            rss_bytes,
            total_memory_bytes,
            used_percent,
        };

        if sample.over_high_water(self.high_water_percent) {
            warn!(
                metric = "ResourceHighWaterMark",
                rss_bytes = sample.rss_bytes,
                used_percent = sample.used_percent,
                "process memory use crossed the configured high-water mark"
            );
        }

        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_high_water_compares_against_threshold() {
        let sample = ResourceSample {
            rss_bytes: 1,
            total_memory_bytes: 100,
            used_percent: 90.0,
        };
        assert!(sample.over_high_water(80.0));
        assert!(!sample.over_high_water(95.0));
    }

    #[test]
    fn sample_returns_nonzero_total_memory() {
        let mut monitor = ResourceMonitor::new(80.0);
        let sample = monitor.sample();
        assert!(sample.total_memory_bytes > 0);
    }
}
