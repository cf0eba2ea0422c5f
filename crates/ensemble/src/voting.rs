//! Voting strategies applied to a completed fan-out round.

use core::LlmResponse;

use crate::engine::Attempt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotingStrategy {
    ConfidenceWeighted,
    MajorityVote,
    Weighted,
    FirstSuccess,
}

impl VotingStrategy {
    pub fn parse(name: &str) -> Self {
        match name {
            "majority_vote" => VotingStrategy::MajorityVote,
            "weighted" => VotingStrategy::Weighted,
            "first_success" => VotingStrategy::FirstSuccess,
            _ => VotingStrategy::ConfidenceWeighted,
        }
    }
}

pub struct VoteOutcome {
    pub winner_index: usize,
    pub consensus: bool,
}

const PREFERRED_BONUS: f32 = 1.2;
const WEIGHT_CONFIDENCE: f32 = 0.5;
const WEIGHT_SUCCESS_RATE: f32 = 0.3;
const WEIGHT_LATENCY: f32 = 0.2;

/// Applies `strategy` over the successful attempts, returning the winning
/// index into `successes` plus whether the round reached consensus.
pub fn vote(
    strategy: VotingStrategy,
    successes: &[&Attempt],
    preferred_providers: &[String],
    provider_success_rate: impl Fn(&str) -> f32,
) -> Option<VoteOutcome> {
    if successes.is_empty() {
        return None;
    }

    match strategy {
        VotingStrategy::FirstSuccess => {
            let winner_index = successes
                .iter()
                .enumerate()
                .min_by_key(|(_, a)| a.response.response_time_ms)
                .map(|(i, _)| i)
                .unwrap_or(0);
            Some(VoteOutcome { winner_index, consensus: true })
        }
        VotingStrategy::ConfidenceWeighted => {
            let scores: Vec<f32> = successes
                .iter()
                .map(|a| a.response.confidence * preferred_bonus(&a.response, preferred_providers))
                .collect();
            let winner_index = argmax_with_tiebreak(successes, &scores);
            let consensus = top_two_gap(&scores) >= 0.1;
            Some(VoteOutcome { winner_index, consensus })
        }
        VotingStrategy::Weighted => {
            let scores: Vec<f32> = successes
                .iter()
                .map(|a| {
                    let latency = a.response.response_time_ms.max(1) as f32;
                    WEIGHT_CONFIDENCE * a.response.confidence
                        + WEIGHT_SUCCESS_RATE * provider_success_rate(&a.response.provider_id)
                        + WEIGHT_LATENCY * (1.0 / latency)
                })
                .collect();
            let winner_index = argmax_with_tiebreak(successes, &scores);
            let consensus = top_two_gap(&scores) >= 0.1;
            Some(VoteOutcome { winner_index, consensus })
        }
        VotingStrategy::MajorityVote => {
            let clusters = cluster_by_content(successes);
            let (winner_cluster, vote_share) = largest_cluster(&clusters, successes, successes.len());
            let winner_index = winner_cluster
                .iter()
                .copied()
                .max_by(|&a, &b| {
                    successes[a]
                        .response
                        .confidence
                        .partial_cmp(&successes[b].response.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(0);
            Some(VoteOutcome { winner_index, consensus: vote_share > 0.5 })
        }
    }
}

fn preferred_bonus(response: &LlmResponse, preferred_providers: &[String]) -> f32 {
    if preferred_providers.iter().any(|p| p == &response.provider_id) {
        PREFERRED_BONUS
    } else {
        1.0
    }
}

/// Picks the highest score, breaking ties by higher confidence, then lower
/// latency, then lexicographic provider id.
fn argmax_with_tiebreak(successes: &[&Attempt], scores: &[f32]) -> usize {
    let mut best = 0;
    for i in 1..successes.len() {
        let better = match scores[i].partial_cmp(&scores[best]).unwrap_or(std::cmp::Ordering::Equal) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => {
                let a = &successes[i].response;
                let b = &successes[best].response;
                (a.confidence, std::cmp::Reverse(a.response_time_ms), &a.provider_id)
                    > (b.confidence, std::cmp::Reverse(b.response_time_ms), &b.provider_id)
            }
        };
        if better {
            best = i;
        }
    }
    best
}

fn top_two_gap(scores: &[f32]) -> f32 {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    if sorted.len() < 2 {
        1.0
    } else {
        sorted[0] - sorted[1]
    }
}

/// Groups response indices by normalized content.
fn cluster_by_content(successes: &[&Attempt]) -> Vec<Vec<usize>> {
    let mut clusters: Vec<(String, Vec<usize>)> = Vec::new();
    for (i, attempt) in successes.iter().enumerate() {
        let key = normalize_content(&attempt.response.content);
        if let Some((_, members)) = clusters.iter_mut().find(|(k, _)| *k == key) {
            members.push(i);
        } else {
            clusters.push((key, vec![i]));
        }
    }
    clusters.into_iter().map(|(_, members)| members).collect()
}

/// Largest cluster wins; ties broken by higher aggregate confidence, then
/// by lower aggregate latency.
fn largest_cluster<'a>(clusters: &'a [Vec<usize>], successes: &[&Attempt], total: usize) -> (&'a [usize], f64) {
    let winner = clusters
        .iter()
        .max_by(|a, b| {
            a.len()
                .cmp(&b.len())
                .then_with(|| {
                    aggregate_confidence(a, successes)
                        .partial_cmp(&aggregate_confidence(b, successes))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| {
                    aggregate_latency_ms(b, successes)
                        .partial_cmp(&aggregate_latency_ms(a, successes))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        })
        .expect("at least one cluster when successes is non-empty");
    let share = winner.len() as f64 / total as f64;
    (winner.as_slice(), share)
}

fn aggregate_confidence(cluster: &[usize], successes: &[&Attempt]) -> f32 {
    cluster.iter().map(|&i| successes[i].response.confidence).sum()
}

fn aggregate_latency_ms(cluster: &[usize], successes: &[&Attempt]) -> f32 {
    let total: f32 = cluster.iter().map(|&i| successes[i].response.response_time_ms as f32).sum();
    total / cluster.len() as f32
}

/// Lowercase, collapse whitespace, strip punctuation, truncate to 500 chars.
fn normalize_content(content: &str) -> String {
    let lowered = content.to_lowercase();
    let stripped: String = lowered.chars().filter(|c| c.is_alphanumeric() || c.is_whitespace()).collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(500).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::FinishReason;
    use uuid::Uuid;

    fn attempt(provider: &str, confidence: f32, latency_ms: u64, content: &str) -> Attempt {
        let mut response = LlmResponse::new(Uuid::nil(), provider.to_string(), provider.to_string(), content.to_string());
        response = response.with_confidence(confidence).with_response_time_ms(latency_ms).with_finish_reason(FinishReason::Stop);
        Attempt { response }
    }

    #[test]
    fn confidence_weighted_picks_the_highest_confidence() {
        let a = attempt("a", 0.5, 100, "hello");
        let b = attempt("b", 0.9, 100, "world");
        let attempts = vec![&a, &b];
        let outcome = vote(VotingStrategy::ConfidenceWeighted, &attempts, &[], |_| 1.0).unwrap();
        assert_eq!(outcome.winner_index, 1);
    }

    #[test]
    fn majority_vote_picks_the_largest_cluster() {
        let a = attempt("a", 0.5, 100, "The Answer Is 42.");
        let b = attempt("b", 0.6, 100, "the answer is 42");
        let c = attempt("c", 0.9, 100, "something totally different");
        let attempts = vec![&a, &b, &c];
        let outcome = vote(VotingStrategy::MajorityVote, &attempts, &[], |_| 1.0).unwrap();
        assert!(outcome.winner_index == 0 || outcome.winner_index == 1);
        assert!(outcome.consensus);
    }

    #[test]
    fn majority_vote_breaks_a_cluster_size_tie_by_higher_aggregate_confidence() {
        let a = attempt("a", 0.9, 100, "cats are great");
        let b = attempt("b", 0.4, 100, "dogs are great");
        let attempts = vec![&a, &b];
        let outcome = vote(VotingStrategy::MajorityVote, &attempts, &[], |_| 1.0).unwrap();
        assert_eq!(outcome.winner_index, 0, "single-member clusters tie 1-vs-1, higher confidence must win");
    }

    #[test]
    fn majority_vote_breaks_a_remaining_tie_by_lower_latency() {
        let a = attempt("a", 0.5, 300, "cats are great");
        let b = attempt("b", 0.5, 50, "dogs are great");
        let attempts = vec![&a, &b];
        let outcome = vote(VotingStrategy::MajorityVote, &attempts, &[], |_| 1.0).unwrap();
        assert_eq!(outcome.winner_index, 1, "confidence ties too, so the faster response must win");
    }

    #[test]
    fn first_success_picks_the_fastest_response() {
        let a = attempt("a", 0.5, 300, "slow");
        let b = attempt("b", 0.5, 50, "fast");
        let attempts = vec![&a, &b];
        let outcome = vote(VotingStrategy::FirstSuccess, &attempts, &[], |_| 1.0).unwrap();
        assert_eq!(outcome.winner_index, 1);
    }

    #[test]
    fn preferred_provider_gets_a_bonus() {
        let a = attempt("a", 0.7, 100, "x");
        let b = attempt("b", 0.7, 100, "y");
        let attempts = vec![&a, &b];
        let outcome = vote(VotingStrategy::ConfidenceWeighted, &attempts, &["b".to_string()], |_| 1.0).unwrap();
        assert_eq!(outcome.winner_index, 1);
    }
}
