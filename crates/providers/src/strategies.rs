//! Selection strategies: given a pool of suitable, healthy providers and a
//! request, pick the one (or ordering) to dispatch to.
//!
//! `basic`, `cost_optimized`, `performance_optimized` and `round_robin` are
//! grounded on the teacher's named-strategy module; `multi_model` borrows
//! its keyword-classification idiom from the same source; `weighted` is
//! genuine roulette-wheel sampling proportional to success rate, unseen
//! providers defaulting to a weight of 1.

use std::sync::atomic::{AtomicUsize, Ordering};

use core::LlmRequest;
use rand::Rng;

use crate::capability::{Feature, ProviderId};
use crate::provider::Provider;

/// A read-only view of a candidate provider, cheap to construct per
/// selection call from the registry's live state.
pub struct Candidate<'a> {
    pub id: ProviderId,
    pub provider: &'a (dyn Provider + Send + Sync),
    pub avg_latency_ms: f64,
    pub current_load: u32,
    /// `success_count / (success_count + failure_count)`, the same figure
    /// the circuit breaker reports as uptime percentage.
    pub success_rate: f32,
    /// Total recorded calls (successes plus failures) observed so far.
    pub request_count: u64,
}

/// Picks the first suitable candidate, in registration order. The simplest
/// strategy and the fallback when no other strategy yields a result.
pub fn basic<'a>(candidates: &[Candidate<'a>]) -> Option<ProviderId> {
    candidates.first().map(|c| c.id.clone())
}

/// Picks the candidate that maximizes `1/unit_price`; providers that
/// advertise no pricing score 0 and lose to any priced candidate.
pub fn cost_optimized<'a>(candidates: &[Candidate<'a>]) -> Option<ProviderId> {
    candidates
        .iter()
        .max_by(|a, b| cost_score(a).partial_cmp(&cost_score(b)).unwrap_or(std::cmp::Ordering::Equal))
        .map(|c| c.id.clone())
}

fn cost_score(candidate: &Candidate<'_>) -> f64 {
    candidate
        .provider
        .capabilities()
        .pricing
        .as_ref()
        .map(|p| 1.0 / p.unit_price() as f64)
        .unwrap_or(0.0)
}

/// `0.7·success_rate + 0.3·(1/avg_latency_ms)` over candidates with at
/// least one recorded request; falls back to `basic` when none qualify.
pub fn performance_optimized<'a>(candidates: &[Candidate<'a>]) -> Option<ProviderId> {
    let experienced: Vec<&Candidate<'a>> = candidates.iter().filter(|c| c.request_count > 0).collect();
    if experienced.is_empty() {
        return basic(candidates);
    }
    experienced
        .into_iter()
        .max_by(|a, b| performance_score(a).partial_cmp(&performance_score(b)).unwrap_or(std::cmp::Ordering::Equal))
        .map(|c| c.id.clone())
}

fn performance_score(candidate: &Candidate<'_>) -> f64 {
    let latency_term = if candidate.avg_latency_ms > 0.0 { 1.0 / candidate.avg_latency_ms } else { 1.0 };
    0.7 * candidate.success_rate as f64 + 0.3 * latency_term
}

/// Classifies the request by keyword into {coding, vision, reasoning,
/// general} and picks the first candidate whose model advertises the
/// matching capability, falling back to `basic` when no match is found.
pub fn multi_model<'a>(candidates: &[Candidate<'a>], request: &LlmRequest) -> Option<ProviderId> {
    let text = request
        .effective_messages()
        .iter()
        .map(|m| m.content.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let wants_vision = ["image", "picture", "photo", "diagram", "screenshot"].iter().any(|kw| text.contains(kw));
    let wants_reasoning = ["prove", "reasoning", "logic", "step by step", "derive"].iter().any(|kw| text.contains(kw));
    let wants_code = ["code", "function", "debug", "compile", "implement"].iter().any(|kw| text.contains(kw));

    let preferred = if wants_vision {
        candidates.iter().find(|c| c.provider.capabilities().supports(Feature::Vision))
    } else if wants_reasoning {
        candidates.iter().find(|c| c.provider.capabilities().supports(Feature::Reasoning))
    } else if wants_code {
        candidates.iter().find(|c| {
            let model = c.id.model.to_lowercase();
            model.contains("code") || model.contains("coder")
        })
    } else {
        None
    };

    preferred.map(|c| c.id.clone()).or_else(|| basic(candidates))
}

/// Stateful round-robin cursor, shared across selection calls for a given
/// pool. Wraps modulo the candidate count observed at call time, so it
/// tolerates providers joining or leaving between calls.
#[derive(Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select<'a>(&self, candidates: &[Candidate<'a>]) -> Option<ProviderId> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Some(candidates[index].id.clone())
    }
}

/// Probabilistic selection proportional to success rate; providers with no
/// recorded requests default to a weight of 1.
pub fn weighted<'a>(candidates: &[Candidate<'a>]) -> Option<ProviderId> {
    if candidates.is_empty() {
        return None;
    }
    let weights: Vec<f64> =
        candidates.iter().map(|c| if c.request_count == 0 { 1.0 } else { c.success_rate as f64 }).collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return basic(candidates);
    }
    let mut roll = rand::thread_rng().gen_range(0.0..total);
    for (candidate, weight) in candidates.iter().zip(weights.iter()) {
        if roll < *weight {
            return Some(candidate.id.clone());
        }
        roll -= weight;
    }
    candidates.last().map(|c| c.id.clone())
}
