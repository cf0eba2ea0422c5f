//! Pattern-matched baseline scores for known model families, combined into
//! a single 0-10 figure under caller-tunable weights.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreComponents {
    pub speed: f32,
    pub efficiency: f32,
    pub cost: f32,
    pub capability: f32,
    pub recency: f32,
}

impl ScoreComponents {
    fn clamp(self) -> Self {
        Self {
            speed: self.speed.clamp(0.0, 10.0),
            efficiency: self.efficiency.clamp(0.0, 10.0),
            cost: self.cost.clamp(0.0, 10.0),
            capability: self.capability.clamp(0.0, 10.0),
            recency: self.recency.clamp(0.0, 10.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub speed: f32,
    pub efficiency: f32,
    pub cost: f32,
    pub capability: f32,
    pub recency: f32,
}

impl Default for Weights {
    fn default() -> Self {
        Self { speed: 0.2, efficiency: 0.2, cost: 0.2, capability: 0.2, recency: 0.2 }
    }
}

impl Weights {
    /// Weight updates must sum to 1.0 within a small tolerance, matching
    /// the rest of the workspace's confidence-sum invariants.
    pub fn validate(self) -> Result<Self, String> {
        let sum = self.speed + self.efficiency + self.cost + self.capability + self.recency;
        if (sum - 1.0).abs() > 0.001 {
            return Err(format!("weights must sum to 1.0 (±0.001), got {sum}"));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelScore {
    pub overall: f32,
    pub components: ScoreComponents,
}

impl ModelScore {
    /// The `(SC:X.X)` suffix used when a score is appended to model-facing
    /// text such as selection explanations.
    pub fn suffix(&self) -> String {
        format!("(SC:{:.1})", self.overall)
    }
}

struct PatternEntry {
    pattern: &'static str,
    components: ScoreComponents,
}

/// Ordered so the first substring match wins; entries are listed from most
/// to least specific so e.g. `"gpt-4o-mini"` is checked before `"gpt-4o"`.
fn pattern_table() -> &'static [PatternEntry] {
    const TABLE: &[PatternEntry] = &[
        PatternEntry {
            pattern: "gpt-4o-mini",
            components: ScoreComponents { speed: 9.0, efficiency: 9.5, cost: 9.5, capability: 8.0, recency: 9.0 },
        },
        PatternEntry {
            pattern: "gpt-4o",
            components: ScoreComponents { speed: 8.0, efficiency: 7.5, cost: 7.0, capability: 9.5, recency: 9.5 },
        },
        PatternEntry {
            pattern: "claude-3.5",
            components: ScoreComponents { speed: 7.5, efficiency: 7.5, cost: 7.0, capability: 9.5, recency: 9.5 },
        },
        PatternEntry {
            pattern: "claude-3-opus",
            components: ScoreComponents { speed: 5.5, efficiency: 5.0, cost: 4.0, capability: 9.5, recency: 8.0 },
        },
        PatternEntry {
            pattern: "claude-3-haiku",
            components: ScoreComponents { speed: 9.5, efficiency: 9.5, cost: 9.5, capability: 7.0, recency: 8.0 },
        },
        PatternEntry {
            pattern: "llama-3",
            components: ScoreComponents { speed: 8.5, efficiency: 8.5, cost: 9.5, capability: 7.5, recency: 8.0 },
        },
        PatternEntry {
            pattern: "mixtral",
            components: ScoreComponents { speed: 8.0, efficiency: 8.0, cost: 9.0, capability: 7.0, recency: 7.0 },
        },
    ];
    TABLE
}

const FALLBACK_COMPONENTS: ScoreComponents =
    ScoreComponents { speed: 6.0, efficiency: 6.0, cost: 6.0, capability: 6.0, recency: 5.0 };

fn components_for(model_id: &str) -> ScoreComponents {
    let lowered = model_id.to_lowercase();
    pattern_table()
        .iter()
        .find(|entry| lowered.contains(entry.pattern))
        .map(|entry| entry.components)
        .unwrap_or(FALLBACK_COMPONENTS)
}

pub fn calculate_score(model_id: &str, weights: Weights) -> ModelScore {
    let components = components_for(model_id).clamp();
    let overall = components.speed * weights.speed
        + components.efficiency * weights.efficiency
        + components.cost * weights.cost
        + components.capability * weights.capability
        + components.recency * weights.recency;
    ModelScore { overall: overall.clamp(0.0, 10.0), components }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_pattern_beats_fallback() {
        let known = calculate_score("gpt-4o-2024-08-06", Weights::default());
        let unknown = calculate_score("some-future-model", Weights::default());
        assert!(known.overall > unknown.overall);
    }

    #[test]
    fn most_specific_pattern_wins() {
        let mini = calculate_score("gpt-4o-mini-2024", Weights::default());
        let full = calculate_score("gpt-4o-2024", Weights::default());
        assert_ne!(mini.components.cost, full.components.cost);
    }

    #[test]
    fn score_is_clamped_and_has_suffix() {
        let score = calculate_score("claude-3.5-sonnet", Weights::default());
        assert!(score.overall <= 10.0 && score.overall >= 0.0);
        assert_eq!(score.suffix(), format!("(SC:{:.1})", score.overall));
    }

    #[test]
    fn weights_must_sum_to_one() {
        let bad = Weights { speed: 0.5, ..Weights::default() };
        assert!(bad.validate().is_err());
        assert!(Weights::default().validate().is_ok());
    }
}

pub fn model_scores_map() -> HashMap<&'static str, ScoreComponents> {
    pattern_table().iter().map(|entry| (entry.pattern, entry.components)).collect()
}
