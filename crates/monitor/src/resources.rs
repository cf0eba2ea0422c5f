//! System resource sampling, grounded on the `sysinfo`-backed system
//! monitor pattern: periodic refresh, memory pressure derived from
//! used/total memory.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use sysinfo::System;

#[derive(Debug, Clone, Serialize)]
pub struct ResourceSnapshot {
    pub total_memory_bytes: u64,
    pub used_memory_bytes: u64,
    pub memory_pressure: f64,
    pub load_average_one: f64,
    pub cpu_count: usize,
}

pub struct ResourceSampler {
    sys: RwLock<System>,
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler {
    pub fn new() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        Self { sys: RwLock::new(sys) }
    }

    pub fn sample(&self) -> ResourceSnapshot {
        let mut sys = self.sys.write();
        sys.refresh_memory();
        sys.refresh_cpu_all();

        let total_memory_bytes = sys.total_memory();
        let used_memory_bytes = sys.used_memory();
        let memory_pressure = if total_memory_bytes == 0 {
            0.0
        } else {
            used_memory_bytes as f64 / total_memory_bytes as f64
        };

        ResourceSnapshot {
            total_memory_bytes,
            used_memory_bytes,
            memory_pressure,
            load_average_one: System::load_average().one,
            cpu_count: sys.cpus().len(),
        }
    }

    pub fn spawn_loop(
        sampler: Arc<ResourceSampler>,
        interval: Duration,
        on_sample: impl Fn(ResourceSnapshot) + Send + 'static,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                on_sample(sampler.sample());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_pressure_is_a_fraction_in_unit_interval() {
        let sampler = ResourceSampler::new();
        let snapshot = sampler.sample();
        assert!(snapshot.memory_pressure >= 0.0 && snapshot.memory_pressure <= 1.0);
    }
}
