//! The provider registry: a single abstraction unifying registration,
//! health tracking, selection and failover dispatch (the teacher split
//! this across a manager, a registry and a strategies map; this
//! implementation consolidates them, per the design notes' resolved open
//! question on registry/aggregator unification).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use core::{AppError, LlmRequest, LlmResponse};
use dashmap::DashMap;
use tracing::{info, warn};

use crate::capability::ProviderId;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::health::{HealthMonitorConfig, HealthTracker};
use crate::provider::Provider;
use crate::strategies::{self, Candidate, RoundRobin};

/// Which built-in strategy `select_best` should apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    Basic,
    CostOptimized,
    PerformanceOptimized,
    MultiModel,
    RoundRobin,
    Weighted,
}

impl SelectionStrategy {
    pub fn parse(name: &str) -> Self {
        match name {
            "cost_optimized" => SelectionStrategy::CostOptimized,
            "performance_optimized" => SelectionStrategy::PerformanceOptimized,
            "multi_model" => SelectionStrategy::MultiModel,
            "round_robin" => SelectionStrategy::RoundRobin,
            "weighted" => SelectionStrategy::Weighted,
            _ => SelectionStrategy::Basic,
        }
    }
}

struct Entry {
    provider: Arc<dyn Provider + Send + Sync>,
    breaker: CircuitBreaker,
    current_load: AtomicU32,
}

/// Registers providers behind a shared `Arc`, tracks per-provider health
/// and circuit breaker state, and dispatches requests with failover across
/// the fallback chain a selection strategy produces.
pub struct ProviderRegistry {
    entries: DashMap<ProviderId, Entry>,
    order: parking_lot::RwLock<Vec<ProviderId>>,
    health: Arc<HealthTracker>,
    round_robin: RoundRobin,
    breaker_config: CircuitBreakerConfig,
}

impl ProviderRegistry {
    pub fn new(breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            entries: DashMap::new(),
            order: parking_lot::RwLock::new(Vec::new()),
            health: Arc::new(HealthTracker::new()),
            round_robin: RoundRobin::new(),
            breaker_config,
        }
    }

    pub fn health_tracker(&self) -> Arc<HealthTracker> {
        self.health.clone()
    }

    /// Registers a provider. Registering an id that is already present is
    /// rejected with `AppError::DuplicateProvider`.
    pub fn register(&self, provider: Arc<dyn Provider + Send + Sync>) -> Result<(), AppError> {
        let id = provider.id();
        if self.entries.contains_key(&id) {
            return Err(AppError::DuplicateProvider(id.to_string()));
        }
        self.entries.insert(
            id.clone(),
            Entry {
                provider,
                breaker: CircuitBreaker::new(self.breaker_config.clone()),
                current_load: AtomicU32::new(0),
            },
        );
        self.order.write().push(id.clone());
        info!(provider = %id, "provider registered");
        Ok(())
    }

    /// Deregisters a provider. Idempotent: deregistering an id that is not
    /// present is a no-op, not an error (a deliberate deviation from the
    /// stricter behavior this was grounded on, recorded in the design
    /// notes).
    pub fn deregister(&self, id: &ProviderId) {
        if self.entries.remove(id).is_some() {
            self.order.write().retain(|existing| existing != id);
            info!(provider = %id, "provider deregistered");
        }
    }

    pub fn get(&self, id: &ProviderId) -> Option<Arc<dyn Provider + Send + Sync>> {
        self.entries.get(id).map(|entry| entry.provider.clone())
    }

    pub fn list(&self) -> Vec<ProviderId> {
        self.order.read().clone()
    }

    /// Snapshot of provider ids that are currently healthy, breaker-available
    /// and suitable for `request` — the candidate pool the ensemble engine
    /// fans out to.
    pub fn available_for(&self, request: &LlmRequest) -> Vec<ProviderId> {
        self.order
            .read()
            .iter()
            .filter(|id| {
                self.entries
                    .get(*id)
                    .map(|entry| {
                        self.health.is_healthy(id)
                            && entry.breaker.is_available()
                            && entry.provider.is_suitable_for(request)
                    })
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// `success_count / (success_count + failure_count)` for a provider, fed
    /// into both the `weighted`/`performance_optimized` selection strategies
    /// and the ensemble's `weighted` voting strategy.
    pub fn success_rate(&self, id: &ProviderId) -> f32 {
        self.entries
            .get(id)
            .map(|entry| entry.breaker.stats().uptime_percentage() as f32 / 100.0)
            .unwrap_or(0.0)
    }

    pub fn record_outcome(&self, id: &ProviderId, latency: std::time::Duration, succeeded: bool) {
        if let Some(entry) = self.entries.get(id) {
            if succeeded {
                entry.breaker.record_success(latency);
            } else {
                entry.breaker.record_failure();
            }
        }
    }

    pub fn spawn_health_loop(&self, config: HealthMonitorConfig) -> tokio::task::JoinHandle<()> {
        let providers: Vec<_> = self.entries.iter().map(|e| e.provider.clone()).collect();
        HealthTracker::spawn_loop(self.health.clone(), providers, config)
    }

    fn candidates_for<'a>(&'a self, request: &LlmRequest, entries: &'a [(ProviderId, dashmap::mapref::one::Ref<'a, ProviderId, Entry>)]) -> Vec<Candidate<'a>> {
        entries
            .iter()
            .filter(|(id, entry)| {
                self.health.is_healthy(id)
                    && entry.breaker.is_available()
                    && entry.provider.is_suitable_for(request)
            })
            .map(|(id, entry)| {
                let stats = entry.breaker.stats();
                Candidate {
                    id: id.clone(),
                    provider: entry.provider.as_ref(),
                    avg_latency_ms: stats.avg_latency_ms,
                    current_load: entry.current_load.load(Ordering::Relaxed),
                    success_rate: (stats.uptime_percentage() / 100.0) as f32,
                    request_count: stats.success_count + stats.failure_count,
                }
            })
            .collect()
    }

    /// Selects the best provider for `request` under `strategy`, from the
    /// currently healthy and suitable pool. Returns
    /// `AppError::NoProvidersAvailable` if the pool is empty.
    pub fn select_best(&self, request: &LlmRequest, strategy: SelectionStrategy) -> Result<ProviderId, AppError> {
        let refs: Vec<(ProviderId, _)> =
            self.order.read().iter().filter_map(|id| self.entries.get(id).map(|e| (id.clone(), e))).collect();
        let candidates = self.candidates_for(request, &refs);
        if candidates.is_empty() {
            return Err(AppError::NoProvidersAvailable);
        }

        let chosen = match strategy {
            SelectionStrategy::Basic => strategies::basic(&candidates),
            SelectionStrategy::CostOptimized => strategies::cost_optimized(&candidates),
            SelectionStrategy::PerformanceOptimized => strategies::performance_optimized(&candidates),
            SelectionStrategy::MultiModel => strategies::multi_model(&candidates, request),
            SelectionStrategy::RoundRobin => self.round_robin.select(&candidates),
            SelectionStrategy::Weighted => strategies::weighted(&candidates),
        };
        chosen.ok_or(AppError::NoProvidersAvailable)
    }

    /// Builds a priority-ordered fallback chain for `request`: the selected
    /// best provider first, then the remaining suitable candidates ordered
    /// by the same strategy's ranking (approximated here by average
    /// latency, cheapest fallback to compute without re-deriving each
    /// strategy's own ordering semantics).
    fn fallback_chain(&self, request: &LlmRequest, strategy: SelectionStrategy) -> Result<Vec<ProviderId>, AppError> {
        let refs: Vec<(ProviderId, _)> =
            self.order.read().iter().filter_map(|id| self.entries.get(id).map(|e| (id.clone(), e))).collect();
        let mut candidates = self.candidates_for(request, &refs);
        if candidates.is_empty() {
            return Err(AppError::NoProvidersAvailable);
        }

        let best = match strategy {
            SelectionStrategy::Basic => strategies::basic(&candidates),
            SelectionStrategy::CostOptimized => strategies::cost_optimized(&candidates),
            SelectionStrategy::PerformanceOptimized => strategies::performance_optimized(&candidates),
            SelectionStrategy::MultiModel => strategies::multi_model(&candidates, request),
            SelectionStrategy::RoundRobin => self.round_robin.select(&candidates),
            SelectionStrategy::Weighted => strategies::weighted(&candidates),
        };

        candidates.sort_by(|a, b| {
            a.avg_latency_ms.partial_cmp(&b.avg_latency_ms).unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut chain: Vec<ProviderId> = Vec::with_capacity(candidates.len());
        if let Some(best) = best {
            chain.push(best.clone());
            chain.extend(candidates.into_iter().map(|c| c.id).filter(|id| *id != best));
        } else {
            chain.extend(candidates.into_iter().map(|c| c.id));
        }
        Ok(chain)
    }

    /// Dispatches `request`, walking the fallback chain until a provider
    /// succeeds. Each hop is gated by that provider's circuit breaker; a
    /// rejected or failed hop moves to the next. Returns
    /// `AppError::AllUnavailable` if every candidate's breaker rejects the
    /// call, or `AppError::AllFailed` if every admitted call itself errors.
    pub async fn execute_with_failover(
        &self,
        request: &LlmRequest,
        strategy: SelectionStrategy,
    ) -> Result<LlmResponse, AppError> {
        let chain = self.fallback_chain(request, strategy)?;

        let mut any_admitted = false;
        let mut last_error: Option<AppError> = None;

        for id in &chain {
            let Some(entry) = self.entries.get(id) else { continue };
            if !entry.breaker.can_execute() {
                continue;
            }
            any_admitted = true;
            entry.current_load.fetch_add(1, Ordering::Relaxed);
            let started = std::time::Instant::now();
            let result = entry.provider.complete(request).await;
            entry.current_load.fetch_sub(1, Ordering::Relaxed);

            match result {
                Ok(response) => {
                    entry.breaker.record_success(started.elapsed());
                    return Ok(response);
                }
                Err(err) => {
                    warn!(provider = %id, error = %err, "provider attempt failed, trying next in chain");
                    entry.breaker.record_failure();
                    last_error = Some(err);
                }
            }
        }

        if !any_admitted {
            return Err(AppError::AllUnavailable);
        }
        match last_error {
            Some(_) => Err(AppError::AllFailed),
            None => Err(AppError::NoProvidersAvailable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ApiStyle, HostedHttpProvider};
    use crate::capability::ProviderCapabilities;

    fn registry_with_one() -> (ProviderRegistry, ProviderId) {
        let registry = ProviderRegistry::new(CircuitBreakerConfig::default());
        let id = ProviderId::new("openai", "gpt-4");
        let provider = HostedHttpProvider::new(
            id.clone(),
            ApiStyle::OpenAiCompatible,
            "key",
            "https://example.invalid",
            ProviderCapabilities::new(vec!["gpt-4".to_string()]),
        );
        registry.register(Arc::new(provider)).unwrap();
        (registry, id)
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let (registry, id) = registry_with_one();
        let dup = HostedHttpProvider::new(
            id,
            ApiStyle::OpenAiCompatible,
            "key",
            "https://example.invalid",
            ProviderCapabilities::new(vec!["gpt-4".to_string()]),
        );
        let err = registry.register(Arc::new(dup)).unwrap_err();
        assert!(matches!(err, AppError::DuplicateProvider(_)));
    }

    #[test]
    fn deregistering_an_unknown_id_is_a_no_op() {
        let (registry, _id) = registry_with_one();
        let missing = ProviderId::new("anthropic", "claude-3");
        registry.deregister(&missing);
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn deregister_then_get_returns_none() {
        let (registry, id) = registry_with_one();
        registry.deregister(&id);
        assert!(registry.get(&id).is_none());
        assert!(registry.list().is_empty());
    }
}
