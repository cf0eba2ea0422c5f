//! Pattern-matched model scoring, cached with TTL invalidation, used as a
//! selection tiebreaker and a prompt-facing `(SC:X.X)` annotation.

pub mod cache;
pub mod model_scores;

pub use cache::ScoringService;
pub use model_scores::{calculate_score, ModelScore, ScoreComponents, Weights};
