//! Bounded-concurrency fan-out: dispatch one request to every suitable,
//! available provider, gather under a deadline, and vote over the results.
//!
//! The fan-out/gather/cancel shape is grounded on the timeout manager's
//! `tokio::select!`-based graceful cancellation, generalized here from a
//! single operation to N concurrent ones sharing a `CancellationToken`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use core::{AppError, LlmRequest, LlmResponse};
use providers::{ProviderId, ProviderRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::voting::{self, VotingStrategy};

/// A successful attempt's recorded response, retained for voting.
pub struct Attempt {
    pub response: LlmResponse,
}

pub struct TaskOutcome {
    pub provider_id: ProviderId,
    pub result: Result<LlmResponse, AppError>,
    pub cancelled: bool,
}

pub struct EnsembleOutcome {
    pub selected: LlmResponse,
    pub all: Vec<TaskOutcome>,
    pub voting_method: VotingStrategy,
    pub consensus: bool,
}

const CANCELLATION_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs the fan-out round for `request` against `registry`, per the
/// configuration embedded in `request.ensemble`.
pub async fn run(
    registry: Arc<ProviderRegistry>,
    request: &LlmRequest,
    max_concurrency: usize,
    default_timeout: Duration,
) -> Result<EnsembleOutcome, AppError> {
    let available = registry.available_for(request);
    let candidates = select_candidates(&available, request);
    if candidates.is_empty() {
        return Err(AppError::NoProvidersAvailable);
    }

    let concurrency = candidates.len().min(max_concurrency);
    let deadline = Duration::from_secs(request.ensemble.timeout_seconds).min(default_timeout);
    let cancel = CancellationToken::new();

    let mut handles = Vec::with_capacity(concurrency);
    for id in candidates.into_iter().take(concurrency) {
        let registry = registry.clone();
        let request = request.clone();
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move { dispatch_one(registry, id, request, cancel).await }));
    }

    let gathered = gather_with_deadline(handles, deadline, &cancel).await;

    let mut attempts: Vec<Attempt> = Vec::new();
    for outcome in &gathered {
        if let Ok(response) = &outcome.result {
            if response.confidence >= request.ensemble.confidence_threshold {
                attempts.push(Attempt { response: response.clone() });
            }
        }
    }
    let success_refs: Vec<&Attempt> = attempts.iter().collect();

    let strategy = VotingStrategy::parse(&request.ensemble.voting_strategy);
    let preferred = request.ensemble.preferred_providers.clone();
    let registry_for_rate = registry.clone();
    let outcome = voting::vote(strategy, &success_refs, &preferred, |provider_id| {
        find_registered_success_rate(&registry_for_rate, provider_id)
    });

    let min_providers = request.ensemble.min_providers.max(1);
    let success_count = success_refs.len();

    match outcome {
        Some(vote_outcome) if success_count >= min_providers => {
            let selected = success_refs[vote_outcome.winner_index].response.clone();
            Ok(EnsembleOutcome { selected, all: gathered, voting_method: strategy, consensus: vote_outcome.consensus })
        }
        Some(vote_outcome) if request.ensemble.fallback_to_best && success_count >= 1 => {
            let selected = success_refs[vote_outcome.winner_index].response.clone();
            Ok(EnsembleOutcome { selected, all: gathered, voting_method: strategy, consensus: vote_outcome.consensus })
        }
        _ if success_count == 0 => Err(AppError::AllFailed),
        _ => Err(AppError::QuorumNotMet { needed: min_providers as u32, got: success_count as u32 }),
    }
}

fn select_candidates(available: &[ProviderId], request: &LlmRequest) -> Vec<ProviderId> {
    if request.ensemble.preferred_providers.is_empty() {
        return available.to_vec();
    }
    let preferred: Vec<ProviderId> = available
        .iter()
        .filter(|id| request.ensemble.preferred_providers.iter().any(|p| id.to_string().contains(p.as_str())))
        .cloned()
        .collect();
    if preferred.is_empty() && !request.ensemble.strict_preferred {
        available.to_vec()
    } else {
        preferred
    }
}

fn find_registered_success_rate(registry: &ProviderRegistry, provider_id: &str) -> f32 {
    registry
        .list()
        .into_iter()
        .find(|id| id.to_string() == provider_id)
        .map(|id| registry.success_rate(&id))
        .unwrap_or(0.0)
}

async fn dispatch_one(
    registry: Arc<ProviderRegistry>,
    id: ProviderId,
    request: LlmRequest,
    cancel: CancellationToken,
) -> TaskOutcome {
    let Some(provider) = registry.get(&id) else {
        return TaskOutcome {
            provider_id: id,
            result: Err(AppError::ProviderNotFound(String::new())),
            cancelled: false,
        };
    };

    let started = Instant::now();
    tokio::select! {
        result = provider.complete(&request) => {
            let elapsed = started.elapsed();
            registry.record_outcome(&id, elapsed, result.is_ok());
            TaskOutcome { provider_id: id, result, cancelled: false }
        }
        _ = cancel.cancelled() => {
            debug!(provider = %id, "ensemble task cancelled");
            TaskOutcome {
                provider_id: id,
                result: Err(AppError::Timeout { elapsed_ms: started.elapsed().as_millis() as u64 }),
                cancelled: true,
            }
        }
    }
}

/// Awaits all handles with a hard deadline. Anything still running when the
/// deadline passes is signalled via `cancel` and given
/// `CANCELLATION_POLL_INTERVAL` to unwind gracefully; tasks that still
/// haven't finished after that are aborted outright. Results already
/// collected by either point are kept — a late provider does not discard
/// its faster siblings.
async fn gather_with_deadline(
    handles: Vec<tokio::task::JoinHandle<TaskOutcome>>,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Vec<TaskOutcome> {
    let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
    let gathered = futures::future::join_all(handles);
    tokio::pin!(gathered);

    tokio::select! {
        results = &mut gathered => {
            return results.into_iter().filter_map(|r| r.ok()).collect();
        }
        _ = tokio::time::sleep(deadline) => {
            warn!("ensemble deadline reached, cancelling outstanding providers");
            cancel.cancel();
        }
    }

    match tokio::time::timeout(CANCELLATION_POLL_INTERVAL, &mut gathered).await {
        Ok(results) => results.into_iter().filter_map(|r| r.ok()).collect(),
        Err(_) => {
            warn!("providers did not honor cancellation in time, aborting");
            for handle in &abort_handles {
                handle.abort();
            }
            gathered.await.into_iter().filter_map(|r| r.ok()).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_providers_filter_the_candidate_pool() {
        let available = vec![ProviderId::new("openai", "gpt-4"), ProviderId::new("anthropic", "claude-3")];
        let mut request = LlmRequest::from_prompt("hi");
        request.ensemble.preferred_providers = vec!["openai".to_string()];
        let candidates = select_candidates(&available, &request);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].provider_type, "openai");
    }

    #[test]
    fn empty_preferred_intersection_falls_back_to_all_unless_strict() {
        let available = vec![ProviderId::new("openai", "gpt-4")];
        let mut request = LlmRequest::from_prompt("hi");
        request.ensemble.preferred_providers = vec!["anthropic".to_string()];
        let candidates = select_candidates(&available, &request);
        assert_eq!(candidates.len(), 1);

        request.ensemble.strict_preferred = true;
        let candidates = select_candidates(&available, &request);
        assert!(candidates.is_empty());
    }

    fn fake_outcome(provider: &str, request_id: uuid::Uuid) -> TaskOutcome {
        TaskOutcome {
            provider_id: ProviderId::new(provider, "model"),
            result: Ok(LlmResponse::new(request_id, provider, provider, "ok")),
            cancelled: false,
        }
    }

    #[tokio::test]
    async fn partial_results_survive_a_deadline_cut_short() {
        let request_id = uuid::Uuid::new_v4();
        let cancel = CancellationToken::new();

        let fast = tokio::spawn(async move { fake_outcome("fast", request_id) });
        let cancel_for_slow = cancel.clone();
        let slow = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(5)) => fake_outcome("slow", request_id),
                _ = cancel_for_slow.cancelled() => TaskOutcome {
                    provider_id: ProviderId::new("slow", "model"),
                    result: Err(AppError::Timeout { elapsed_ms: 0 }),
                    cancelled: true,
                },
            }
        });

        let results = gather_with_deadline(vec![fast, slow], Duration::from_millis(20), &cancel).await;

        assert_eq!(results.len(), 2, "the fast task's result must not be discarded by the slow task's timeout");
        assert!(results.iter().any(|o| o.provider_id.provider_type == "fast" && o.result.is_ok()));
        assert!(results.iter().any(|o| o.provider_id.provider_type == "slow" && o.cancelled));
    }
}
