//! Bounded retry with exponential backoff and full jitter, applied only to
//! `AppError::ProviderTransient` (§7: fatal classifications are never
//! retried).

use std::future::Future;
use std::time::Duration;

use core::AppError;
use rand::Rng;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn conservative() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 1.5,
        }
    }

    pub fn aggressive() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(120),
            backoff_multiplier: 2.5,
        }
    }

    /// Full jitter: a uniformly random delay in `[0, base)`, where `base`
    /// grows geometrically with the attempt number, capped at `max_delay`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);
        let jittered_ms = rand::thread_rng().gen_range(0.0..=capped_ms.max(1.0));
        Duration::from_millis(jittered_ms as u64)
    }
}

/// Runs `op` up to `config.max_retries + 1` times, retrying only on
/// `AppError::ProviderTransient`. Any other error (fatal) returns
/// immediately without consuming a retry attempt.
pub async fn run_with_retry<F, Fut, T>(config: &RetryConfig, mut op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err @ AppError::ProviderTransient { .. }) => {
                if attempt >= config.max_retries {
                    return Err(err);
                }
                let delay = config.backoff_delay(attempt);
                debug!(attempt, ?delay, "retrying after transient provider error");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(other) => return Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig { initial_delay: Duration::from_millis(1), ..RetryConfig::default() };

        let result = run_with_retry(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AppError::ProviderTransient { provider: "p".into(), message: "boom".into() })
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::default();

        let result: Result<i32, AppError> = run_with_retry(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(AppError::ProviderFatal { provider: "p".into(), message: "bad".into() }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded_by_max_retries() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            ..RetryConfig::default()
        };

        let result: Result<i32, AppError> = run_with_retry(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(AppError::ProviderTransient { provider: "p".into(), message: "boom".into() }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
