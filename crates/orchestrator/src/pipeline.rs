//! Composition root: `RequestSource -> providers::ProviderRegistry ->
//! ensemble::run -> LogSink`, with every call observed by the monitor.

use std::sync::Arc;
use std::time::Duration;

use core::{AppError, LlmRequest, LlmResponse};
use ensemble::EnsembleOutcome;
use monitor::{AlertManager, MetricsStore};
use providers::ProviderRegistry;
use tracing::{error, info, warn};

use crate::traits::{LogSink, RequestSource};

pub struct PipelineConfig {
    pub max_concurrency: usize,
    pub default_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { max_concurrency: 8, default_timeout: Duration::from_secs(30) }
    }
}

/// Ties a provider registry to the monitor that observes every dispatched
/// call. One instance drives as many `RequestSource`/`LogSink` pairs as the
/// caller wants to run concurrently.
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    metrics: Arc<MetricsStore>,
    alerts: Arc<AlertManager>,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(registry: Arc<ProviderRegistry>, metrics: Arc<MetricsStore>, alerts: Arc<AlertManager>, config: PipelineConfig) -> Self {
        Self { registry, metrics, alerts, config }
    }

    /// Runs one request through selection, fan-out and voting, recording
    /// the outcome for monitoring regardless of success or failure.
    pub async fn handle_request(&self, request: &LlmRequest) -> Result<LlmResponse, AppError> {
        let started = std::time::Instant::now();
        let result = ensemble::run(self.registry.clone(), request, self.config.max_concurrency, self.config.default_timeout).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(outcome) => self.record_observation(outcome, elapsed),
            Err(err) => {
                self.metrics.record_request("ensemble", elapsed, false, Some(err.to_string()));
                warn!(error = %err, "ensemble request failed");
            }
        }

        if let Some(metrics) = self.metrics.get_metrics("ensemble") {
            self.alerts.evaluate(&metrics);
        }

        result.map(|outcome| outcome.selected)
    }

    fn record_observation(&self, outcome: &EnsembleOutcome, elapsed: Duration) {
        self.metrics.record_request("ensemble", elapsed, true, None);
        for attempt in &outcome.all {
            let protocol = attempt.provider_id.to_string();
            let succeeded = attempt.result.is_ok();
            let duration = attempt.result.as_ref().map(|r| Duration::from_millis(r.response_time_ms)).unwrap_or(elapsed);
            self.metrics.record_request(&protocol, duration, succeeded, attempt.result.as_ref().err().map(|e| e.to_string()));
            if let Some(per_provider) = self.metrics.get_metrics(&protocol) {
                self.alerts.evaluate(&per_provider);
            }
        }
    }

    /// Drains `source` until it is exhausted, persisting every response
    /// (successful or not logged) via `sink`. A single request's failure is
    /// logged and does not stop the drain.
    pub async fn run_source(&self, mut source: impl RequestSource, sink: impl LogSink) -> usize {
        let mut handled = 0;
        while let Some(request) = source.next_request().await {
            match self.handle_request(&request).await {
                Ok(response) => {
                    if let Err(err) = sink.upsert(&response).await {
                        error!(error = %err, "log sink rejected a completed response");
                    }
                    handled += 1;
                }
                Err(err) => {
                    info!(error = %err, request_id = %request.id, "request did not produce a response");
                }
            }
        }
        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::test_support::{QueueSource, RecordingSink};
    use providers::{ApiStyle, CircuitBreakerConfig, HostedHttpProvider, ProviderCapabilities, ProviderId};
    use std::collections::VecDeque;

    fn registry_with_one_unreachable_provider() -> Arc<ProviderRegistry> {
        let registry = ProviderRegistry::new(CircuitBreakerConfig::default());
        let id = ProviderId::new("openai", "gpt-4");
        let provider = HostedHttpProvider::new(
            id,
            ApiStyle::OpenAiCompatible,
            "key",
            "https://example.invalid",
            ProviderCapabilities::new(vec!["gpt-4".to_string()]),
        );
        registry.register(Arc::new(provider)).unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn run_source_logs_and_skips_requests_whose_providers_all_fail() {
        let registry = registry_with_one_unreachable_provider();
        let orchestrator = Orchestrator::new(registry, Arc::new(MetricsStore::default()), Arc::new(AlertManager::new()), PipelineConfig::default());

        let mut queue = VecDeque::new();
        queue.push_back(LlmRequest::from_prompt("hi"));
        let source = QueueSource(parking_lot::Mutex::new(queue));
        let sink = RecordingSink::default();

        let handled = orchestrator.run_source(source, sink).await;
        assert_eq!(handled, 0, "the only registered provider points at a reserved, unreachable hostname");
        assert!(orchestrator.metrics.get_metrics("ensemble").is_some(), "the failed attempt is still observed");
    }
}
