//! TTL-bounded cache in front of `calculate_score`, invalidated wholesale
//! whenever the scoring weights change.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::model_scores::{calculate_score, ModelScore, Weights};

const DEFAULT_TTL: Duration = Duration::from_secs(6 * 60 * 60);

struct Entry {
    score: ModelScore,
    inserted_at: Instant,
}

pub struct ScoringService {
    ttl: Duration,
    weights: Mutex<Weights>,
    cache: Mutex<HashMap<String, Entry>>,
}

impl Default for ScoringService {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ScoringService {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, weights: Mutex::new(Weights::default()), cache: Mutex::new(HashMap::new()) }
    }

    pub fn calculate_score(&self, model_id: &str) -> ModelScore {
        let now = Instant::now();
        {
            let cache = self.cache.lock();
            if let Some(entry) = cache.get(model_id) {
                if now.duration_since(entry.inserted_at) < self.ttl {
                    return entry.score;
                }
            }
        }
        let weights = *self.weights.lock();
        let score = calculate_score(model_id, weights);
        self.cache.lock().insert(model_id.to_string(), Entry { score, inserted_at: now });
        score
    }

    /// Replaces the active weights and drops every cached score so the
    /// next lookup recomputes under the new weighting.
    pub fn update_weights(&self, weights: Weights) -> Result<(), String> {
        let weights = weights.validate()?;
        *self.weights.lock() = weights;
        let mut cache = self.cache.lock();
        let dropped = cache.len();
        cache.clear();
        debug!(dropped, "scoring cache invalidated after weight update");
        Ok(())
    }

    pub fn cached_entry_count(&self) -> usize {
        self.cache.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_lookups_hit_the_cache() {
        let svc = ScoringService::default();
        let first = svc.calculate_score("gpt-4o");
        let second = svc.calculate_score("gpt-4o");
        assert_eq!(first, second);
        assert_eq!(svc.cached_entry_count(), 1);
    }

    #[test]
    fn expired_entries_are_recomputed() {
        let svc = ScoringService::new(Duration::from_millis(1));
        svc.calculate_score("gpt-4o");
        std::thread::sleep(Duration::from_millis(5));
        svc.calculate_score("gpt-4o");
        assert_eq!(svc.cached_entry_count(), 1);
    }

    #[test]
    fn weight_update_invalidates_the_cache() {
        let svc = ScoringService::default();
        svc.calculate_score("gpt-4o");
        assert_eq!(svc.cached_entry_count(), 1);
        svc.update_weights(Weights { speed: 1.0, efficiency: 0.0, cost: 0.0, capability: 0.0, recency: 0.0 }).unwrap();
        assert_eq!(svc.cached_entry_count(), 0);
    }

    #[test]
    fn invalid_weight_update_is_rejected_and_keeps_old_weights() {
        let svc = ScoringService::default();
        let bad = Weights { speed: 2.0, ..Weights::default() };
        assert!(svc.update_weights(bad).is_err());
    }
}
