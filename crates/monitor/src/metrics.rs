//! Per-protocol metrics aggregation: incremental latency statistics and a
//! genuine rolling-window throughput (not a lifetime average).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

const DEFAULT_THROUGHPUT_WINDOW: Duration = Duration::from_secs(60);
const MAX_TIMESTAMP_SAMPLES: usize = 10_000;

#[derive(Debug, Clone, Serialize)]
pub struct ProtocolMetrics {
    pub protocol: String,
    pub request_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub error_rate: f32,
    pub throughput_per_sec: f32,
    pub active_connections: u32,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

struct ProtocolState {
    request_count: u64,
    success_count: u64,
    failure_count: u64,
    total_latency_ms: f64,
    avg_latency_ms: f64,
    min_latency_ms: u64,
    max_latency_ms: u64,
    request_timestamps: VecDeque<Instant>,
    active_connections: u32,
    cache_hits: u64,
    cache_misses: u64,
    last_error: Option<String>,
}

impl Default for ProtocolState {
    fn default() -> Self {
        Self {
            request_count: 0,
            success_count: 0,
            failure_count: 0,
            total_latency_ms: 0.0,
            avg_latency_ms: 0.0,
            min_latency_ms: u64::MAX,
            max_latency_ms: 0,
            request_timestamps: VecDeque::new(),
            active_connections: 0,
            cache_hits: 0,
            cache_misses: 0,
            last_error: None,
        }
    }
}

pub struct MetricsStore {
    protocols: DashMap<String, Mutex<ProtocolState>>,
    throughput_window: Duration,
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new(DEFAULT_THROUGHPUT_WINDOW)
    }
}

impl MetricsStore {
    pub fn new(throughput_window: Duration) -> Self {
        Self { protocols: DashMap::new(), throughput_window }
    }

    pub fn record_request(&self, protocol: &str, duration: Duration, success: bool, error_msg: Option<String>) {
        let entry = self.protocols.entry(protocol.to_string()).or_insert_with(|| Mutex::new(ProtocolState::default()));
        let mut state = entry.lock();
        let latency_ms = duration.as_millis() as u64;

        state.request_count += 1;
        if success {
            state.success_count += 1;
        } else {
            state.failure_count += 1;
            state.last_error = error_msg;
        }

        state.total_latency_ms += latency_ms as f64;
        state.avg_latency_ms = state.total_latency_ms / state.request_count as f64;
        state.min_latency_ms = state.min_latency_ms.min(latency_ms);
        state.max_latency_ms = state.max_latency_ms.max(latency_ms);

        let now = Instant::now();
        state.request_timestamps.push_back(now);
        if state.request_timestamps.len() > MAX_TIMESTAMP_SAMPLES {
            state.request_timestamps.pop_front();
        }
        prune_timestamps(&mut state.request_timestamps, now, self.throughput_window);
    }

    pub fn update_connections(&self, protocol: &str, active_connections: u32) {
        let entry = self.protocols.entry(protocol.to_string()).or_insert_with(|| Mutex::new(ProtocolState::default()));
        entry.lock().active_connections = active_connections;
    }

    pub fn update_cache_stats(&self, protocol: &str, hits: u64, misses: u64) {
        let entry = self.protocols.entry(protocol.to_string()).or_insert_with(|| Mutex::new(ProtocolState::default()));
        let mut state = entry.lock();
        state.cache_hits = hits;
        state.cache_misses = misses;
    }

    pub fn get_metrics(&self, protocol: &str) -> Option<ProtocolMetrics> {
        self.protocols.get(protocol).map(|entry| {
            let mut state = entry.lock();
            let now = Instant::now();
            prune_timestamps(&mut state.request_timestamps, now, self.throughput_window);
            snapshot(protocol, &state, self.throughput_window)
        })
    }

    pub fn get_all_metrics(&self) -> Vec<ProtocolMetrics> {
        self.protocols
            .iter()
            .map(|entry| {
                let mut state = entry.value().lock();
                let now = Instant::now();
                prune_timestamps(&mut state.request_timestamps, now, self.throughput_window);
                snapshot(entry.key(), &state, self.throughput_window)
            })
            .collect()
    }
}

fn prune_timestamps(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = timestamps.front() {
        if now.duration_since(front) > window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}

fn snapshot(protocol: &str, state: &ProtocolState, window: Duration) -> ProtocolMetrics {
    let error_rate = if state.request_count == 0 {
        0.0
    } else {
        state.failure_count as f32 / state.request_count as f32
    };
    let throughput_per_sec = state.request_timestamps.len() as f32 / window.as_secs_f32();

    ProtocolMetrics {
        protocol: protocol.to_string(),
        request_count: state.request_count,
        success_count: state.success_count,
        failure_count: state.failure_count,
        avg_latency_ms: state.avg_latency_ms,
        min_latency_ms: if state.min_latency_ms == u64::MAX { 0 } else { state.min_latency_ms },
        max_latency_ms: state.max_latency_ms,
        error_rate,
        throughput_per_sec,
        active_connections: state.active_connections,
        cache_hits: state.cache_hits,
        cache_misses: state.cache_misses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_average_is_incremental() {
        let store = MetricsStore::new(Duration::from_secs(60));
        store.record_request("mcp", Duration::from_millis(100), true, None);
        store.record_request("mcp", Duration::from_millis(200), true, None);
        let metrics = store.get_metrics("mcp").unwrap();
        assert_eq!(metrics.avg_latency_ms, 150.0);
        assert_eq!(metrics.min_latency_ms, 100);
        assert_eq!(metrics.max_latency_ms, 200);
    }

    #[test]
    fn error_rate_is_failures_over_total() {
        let store = MetricsStore::new(Duration::from_secs(60));
        store.record_request("mcp", Duration::from_millis(10), true, None);
        store.record_request("mcp", Duration::from_millis(10), false, Some("boom".to_string()));
        let metrics = store.get_metrics("mcp").unwrap();
        assert_eq!(metrics.error_rate, 0.5);
    }

    #[test]
    fn throughput_only_counts_requests_within_the_window() {
        let store = MetricsStore::new(Duration::from_millis(10));
        store.record_request("mcp", Duration::from_millis(1), true, None);
        std::thread::sleep(Duration::from_millis(30));
        let metrics = store.get_metrics("mcp").unwrap();
        assert_eq!(metrics.throughput_per_sec, 0.0);
    }

    #[test]
    fn unknown_protocol_has_no_metrics() {
        let store = MetricsStore::new(Duration::from_secs(60));
        assert!(store.get_metrics("unknown").is_none());
    }
}
