//! Per-provider circuit breaker: `closed -> open -> half_open -> closed`.
//!
//! Grounded on the richer of the two breakers in the teacher lineage (atomics,
//! `thiserror`, full stats) but constrained to admit exactly one in-flight
//! half-open probe, per the `CircuitState` invariant: "half_open: at most one
//! probe call admitted".

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CircuitBreakerError {
    #[error("circuit is open")]
    Open,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl Default for CircuitState {
    fn default() -> Self {
        CircuitState::Closed
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub trip_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { trip_threshold: 5, cooldown: Duration::from_secs(30) }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CircuitBreakerStats {
    pub success_count: u64,
    pub failure_count: u64,
    pub consecutive_failures: u32,
    pub avg_latency_ms: f64,
}

impl CircuitBreakerStats {
    /// `success_count / (success_count + failure_count)`.
    pub fn uptime_percentage(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            100.0
        } else {
            (self.success_count as f64 / total as f64) * 100.0
        }
    }
}

/// Inner mutable state behind a single lock, guarding transitions.
struct Inner {
    state: CircuitState,
    open_until: Option<Instant>,
    half_open_in_flight: bool,
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    consecutive_failures: AtomicU32,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    // avg_latency_ms stored as bits of an f64 for lock-free incremental mean.
    avg_latency_bits: AtomicU64,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker").field("state", &self.state()).finish()
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner { state: CircuitState::Closed, open_until: None, half_open_in_flight: false }),
            consecutive_failures: AtomicU32::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            avg_latency_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("circuit breaker lock poisoned").state
    }

    /// `IsAvailable()`: closed, or half_open with no probe currently
    /// in-flight (an open breaker past its cooldown counts as available —
    /// calling `can_execute` performs the open->half_open transition).
    pub fn is_available(&self) -> bool {
        self.can_execute()
    }

    /// Admission check. Performs the `open -> half_open` transition as a
    /// side effect when the cooldown has elapsed.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed_cooldown = inner.open_until.map(|until| Instant::now() >= until).unwrap_or(false);
                if elapsed_cooldown {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight {
                    false
                } else {
                    inner.half_open_in_flight = true;
                    true
                }
            }
        }
    }

    /// Runs `op` under the breaker: admits or rejects, runs `op` with the
    /// lock released, records the outcome atomically.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, CallOutcome<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.can_execute() {
            return Err(CallOutcome::Rejected);
        }
        let started = Instant::now();
        match op().await {
            Ok(value) => {
                self.record_success(started.elapsed());
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(CallOutcome::Failed(err))
            }
        }
    }

    pub fn record_success(&self, latency: Duration) {
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.update_avg_latency(latency.as_millis() as f64);

        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        inner.half_open_in_flight = false;
        inner.state = CircuitState::Closed;
        inner.open_until = None;
    }

    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        let consecutive = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;

        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        match inner.state {
            CircuitState::Closed => {
                if consecutive >= self.config.trip_threshold {
                    inner.state = CircuitState::Open;
                    inner.open_until = Some(Instant::now() + self.config.cooldown);
                }
            }
            CircuitState::HalfOpen => {
                inner.half_open_in_flight = false;
                inner.state = CircuitState::Open;
                inner.open_until = Some(Instant::now() + self.config.cooldown);
            }
            CircuitState::Open => {}
        }
    }

    fn update_avg_latency(&self, sample_ms: f64) {
        let n = self.success_count.load(Ordering::Relaxed).max(1) as f64;
        loop {
            let current_bits = self.avg_latency_bits.load(Ordering::Relaxed);
            let current = f64::from_bits(current_bits);
            let updated = (current * (n - 1.0) + sample_ms) / n;
            if self
                .avg_latency_bits
                .compare_exchange(current_bits, updated.to_bits(), Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            success_count: self.success_count.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            avg_latency_ms: f64::from_bits(self.avg_latency_bits.load(Ordering::Relaxed)),
        }
    }
}

/// Outcome of a breaker-gated call: either the operation's own error, or a
/// rejection because the breaker was not available.
#[derive(Debug)]
pub enum CallOutcome<E> {
    Rejected,
    Failed(E),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_breaker_admits_calls() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        assert!(cb.can_execute());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn breaker_trips_open_at_threshold() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig { trip_threshold: 3, ..Default::default() });
        for i in 0..3 {
            assert!(cb.can_execute());
            cb.record_failure();
            if i < 2 {
                assert_eq!(cb.state(), CircuitState::Closed);
            }
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_execute());
    }

    #[test]
    fn half_open_admits_exactly_one_probe() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            trip_threshold: 1,
            cooldown: Duration::from_millis(0),
        });
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        assert!(cb.can_execute());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(!cb.can_execute(), "a second concurrent probe must be rejected");
    }

    #[test]
    fn success_in_half_open_closes_the_breaker() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            trip_threshold: 1,
            cooldown: Duration::from_millis(0),
        });
        cb.record_failure();
        assert!(cb.can_execute());
        cb.record_success(Duration::from_millis(10));
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn failure_in_half_open_reopens() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            trip_threshold: 1,
            cooldown: Duration::from_millis(0),
        });
        cb.record_failure();
        assert!(cb.can_execute());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn avg_latency_is_an_incremental_mean() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        cb.record_success(Duration::from_millis(100));
        cb.record_success(Duration::from_millis(200));
        assert_eq!(cb.stats().avg_latency_ms, 150.0);
    }

    #[test]
    fn uptime_percentage_is_success_over_total() {
        let stats = CircuitBreakerStats { success_count: 3, failure_count: 1, ..Default::default() };
        assert_eq!(stats.uptime_percentage(), 75.0);
    }
}
