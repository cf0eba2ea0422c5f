//! Background health probing for registered providers.
//!
//! Grounded on the periodic `tokio::spawn` monitor loop pattern, retargeted
//! to a 5s probe timeout and a simple `Healthy/Unhealthy` classification
//! (the richer scoring the teacher derives from its monitor belongs to
//! `monitor`, not here).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::capability::ProviderId;
use crate::provider::Provider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    pub check_interval: Duration,
    pub check_timeout: Duration,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self { check_interval: Duration::from_secs(30), check_timeout: Duration::from_secs(5) }
    }
}

/// Tracks the last-known health status per provider id. Populated by an
/// explicit `check_once` call or by the background loop spawned from
/// `spawn_loop`; the registry consults it before dispatch.
#[derive(Default)]
pub struct HealthTracker {
    statuses: RwLock<HashMap<ProviderId, HealthStatus>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, id: &ProviderId) -> HealthStatus {
        self.statuses.read().get(id).copied().unwrap_or(HealthStatus::Unknown)
    }

    pub fn is_healthy(&self, id: &ProviderId) -> bool {
        !matches!(self.status(id), HealthStatus::Unhealthy)
    }

    fn set_status(&self, id: ProviderId, status: HealthStatus) {
        self.statuses.write().insert(id, status);
    }

    /// Probes a single provider with the configured timeout and records the
    /// outcome.
    pub async fn check_once(
        &self,
        provider: &(dyn Provider + Send + Sync),
        config: &HealthMonitorConfig,
    ) {
        let id = provider.id();
        let outcome = tokio::time::timeout(config.check_timeout, provider.health_check()).await;
        match outcome {
            Ok(Ok(())) => {
                debug!(provider = %id, "health check passed");
                self.set_status(id, HealthStatus::Healthy);
            }
            Ok(Err(err)) => {
                warn!(provider = %id, error = %err, "health check failed");
                self.set_status(id, HealthStatus::Unhealthy);
            }
            Err(_) => {
                warn!(provider = %id, "health check timed out");
                self.set_status(id, HealthStatus::Unhealthy);
            }
        }
    }

    /// Spawns the periodic probe loop for a set of providers. The returned
    /// `JoinHandle` is owned by the caller (typically the registry), which
    /// aborts it on shutdown.
    pub fn spawn_loop(
        tracker: Arc<HealthTracker>,
        providers: Vec<Arc<dyn Provider + Send + Sync>>,
        config: HealthMonitorConfig,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.check_interval);
            loop {
                ticker.tick().await;
                for provider in &providers {
                    tracker.check_once(provider.as_ref(), &config).await;
                }
            }
        })
    }
}
