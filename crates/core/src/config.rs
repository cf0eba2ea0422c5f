use std::time::Duration;

use crate::error::AppError;

/// Process-wide configuration, loaded once at startup from the environment.
///
/// Mirrors `crates/llm/src/lib.rs::LlmClient::from_env` in the teacher: a
/// `.env` file is loaded if present (missing file is not an error), then
/// typed fields are read with documented defaults. Unlike the teacher,
/// invalid values fail at load time rather than surfacing as a runtime
/// surprise on first use.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub breaker_trip_threshold: u32,
    pub breaker_cooldown: Duration,
    pub health_check_interval: Duration,
    pub health_check_timeout: Duration,
    pub ensemble_default_timeout: Duration,
    pub ensemble_max_concurrency: usize,
    pub alert_history_limit: usize,
    pub alert_channel_capacity: usize,
    pub resource_sample_interval: Duration,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            breaker_trip_threshold: 5,
            breaker_cooldown: Duration::from_secs(30),
            health_check_interval: Duration::from_secs(30),
            health_check_timeout: Duration::from_secs(5),
            ensemble_default_timeout: Duration::from_secs(30),
            ensemble_max_concurrency: 16,
            alert_history_limit: 1000,
            alert_channel_capacity: 100,
            resource_sample_interval: Duration::from_secs(30),
            retry_max_attempts: 3,
            retry_base_delay: Duration::from_millis(100),
        }
    }
}

impl RuntimeConfig {
    /// Loads `.env` (ignored if absent) then overlays documented defaults
    /// with whatever the process environment sets.
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenv::dotenv();
        let mut config = Self::default();

        if let Some(v) = env_u32("BREAKER_TRIP_THRESHOLD")? {
            config.breaker_trip_threshold = v;
        }
        if let Some(v) = env_secs("BREAKER_COOLDOWN_SECS")? {
            config.breaker_cooldown = v;
        }
        if let Some(v) = env_secs("HEALTH_CHECK_INTERVAL_SECS")? {
            config.health_check_interval = v;
        }
        if let Some(v) = env_secs("HEALTH_CHECK_TIMEOUT_SECS")? {
            config.health_check_timeout = v;
        }
        if let Some(v) = env_secs("ENSEMBLE_DEFAULT_TIMEOUT_SECS")? {
            config.ensemble_default_timeout = v;
        }
        if let Some(v) = env_usize("ENSEMBLE_MAX_CONCURRENCY")? {
            config.ensemble_max_concurrency = v;
        }
        if let Some(v) = env_usize("ALERT_HISTORY_LIMIT")? {
            config.alert_history_limit = v;
        }
        if let Some(v) = env_usize("ALERT_CHANNEL_CAPACITY")? {
            config.alert_channel_capacity = v;
        }
        if let Some(v) = env_secs("RESOURCE_SAMPLE_INTERVAL_SECS")? {
            config.resource_sample_interval = v;
        }
        if let Some(v) = env_u32("RETRY_MAX_ATTEMPTS")? {
            config.retry_max_attempts = v;
        }
        if let Some(v) = env_millis("RETRY_BASE_DELAY_MS")? {
            config.retry_base_delay = v;
        }

        Ok(config)
    }

    /// Reads `<PROVIDER>_API_KEY` / `<PROVIDER>_BASE_URL` for a provider name
    /// (e.g. `openai`, `anthropic`). Absence of a required key is the
    /// caller's signal to disqualify the provider at registration time.
    pub fn provider_credentials(provider: &str) -> (Option<String>, Option<String>) {
        let upper = provider.to_uppercase();
        let key = std::env::var(format!("{upper}_API_KEY")).ok();
        let base_url = std::env::var(format!("{upper}_BASE_URL")).ok();
        (key, base_url)
    }
}

fn env_u32(key: &str) -> Result<Option<u32>, AppError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<u32>()
            .map(Some)
            .map_err(|e| AppError::Configuration(format!("{key}: {e}"))),
        Err(_) => Ok(None),
    }
}

fn env_usize(key: &str) -> Result<Option<usize>, AppError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<usize>()
            .map(Some)
            .map_err(|e| AppError::Configuration(format!("{key}: {e}"))),
        Err(_) => Ok(None),
    }
}

fn env_secs(key: &str) -> Result<Option<Duration>, AppError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<u64>()
            .map(Duration::from_secs)
            .map(Some)
            .map_err(|e| AppError::Configuration(format!("{key}: {e}"))),
        Err(_) => Ok(None),
    }
}

fn env_millis(key: &str) -> Result<Option<Duration>, AppError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<u64>()
            .map(Duration::from_millis)
            .map(Some)
            .map_err(|e| AppError::Configuration(format!("{key}: {e}"))),
        Err(_) => Ok(None),
    }
}
