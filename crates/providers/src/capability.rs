use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Identifies a registered provider instance. Providers may share a vendor
/// (`provider_type`) while differing by model or region, so identity is the
/// triple rather than a bare name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId {
    pub provider_type: String,
    pub model: String,
    pub region: Option<String>,
}

impl ProviderId {
    pub fn new(provider_type: impl Into<String>, model: impl Into<String>) -> Self {
        Self { provider_type: provider_type.into(), model: model.into(), region: None }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn display(&self) -> String {
        match &self.region {
            Some(region) => format!("{}/{} ({region})", self.provider_type, self.model),
            None => format!("{}/{}", self.provider_type, self.model),
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Features a provider may advertise support for. Suitability filtering in
/// the registry checks a request's requirements against this set rather than
/// against the provider's concrete type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Text,
    Chat,
    Streaming,
    FunctionCalling,
    Vision,
    Reasoning,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LatencyClass {
    UltraFast,
    Fast,
    Standard,
    Slow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pricing {
    pub cost_per_1k_input: f32,
    pub cost_per_1k_output: f32,
}

impl Pricing {
    /// Unit price used by the `cost_optimized` strategy: cost of a
    /// representative 1:1 input/output token mix.
    pub fn unit_price(&self) -> f32 {
        (self.cost_per_1k_input + self.cost_per_1k_output) / 2.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub supported_models: Vec<String>,
    pub supported_features: HashSet<Feature>,
    pub max_tokens: u32,
    pub max_concurrent: u32,
    pub requests_per_minute: u32,
    pub latency_class: LatencyClass,
    pub pricing: Option<Pricing>,
}

impl ProviderCapabilities {
    pub fn new(supported_models: Vec<String>) -> Self {
        Self {
            supported_models,
            supported_features: HashSet::from([Feature::Text, Feature::Chat]),
            max_tokens: 4096,
            max_concurrent: 10,
            requests_per_minute: 60,
            latency_class: LatencyClass::Standard,
            pricing: None,
        }
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.supported_features.insert(feature);
        self
    }

    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    pub fn supports(&self, feature: Feature) -> bool {
        self.supported_features.contains(&feature)
    }

    pub fn supports_model(&self, model: &str) -> bool {
        self.supported_models.iter().any(|m| m == model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_id_display_includes_region_when_present() {
        let id = ProviderId::new("openai", "gpt-4o").with_region("us-east");
        assert_eq!(id.display(), "openai/gpt-4o (us-east)");
    }

    #[test]
    fn unit_price_is_the_midpoint_of_input_and_output_cost() {
        let pricing = Pricing { cost_per_1k_input: 0.01, cost_per_1k_output: 0.03 };
        assert_eq!(pricing.unit_price(), 0.02);
    }
}
