use async_trait::async_trait;
use core::{AppError, LlmRequest, LlmResponse};

use crate::capability::{Feature, ProviderCapabilities, ProviderId};

/// Uniform contract every concrete provider adaptation implements.
///
/// Per the tagged-variant redesign (see DESIGN.md), this trait is not made
/// into a trait object anywhere in the dispatch path; `ProviderWrapper`
/// below is the closed set of adaptations, matched exhaustively.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    fn id(&self) -> ProviderId;

    fn display_name(&self) -> String {
        self.id().display()
    }

    fn capabilities(&self) -> &ProviderCapabilities;

    /// A cheap, network-bound liveness probe used by the health tracker.
    /// Bounded to a hard 5s timeout by the caller, not by the implementation.
    async fn health_check(&self) -> Result<(), AppError>;

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, AppError>;

    /// Request-shape validation before dispatch: max_tokens within the
    /// provider's limit and the requested model (if any) is supported.
    fn validate_request(&self, request: &LlmRequest) -> Result<(), AppError> {
        let caps = self.capabilities();
        if request.sampling.max_tokens > caps.max_tokens {
            return Err(AppError::InvalidRequest {
                field: "max_tokens".to_string(),
                reason: format!(
                    "requested {} exceeds provider limit {}",
                    request.sampling.max_tokens, caps.max_tokens
                ),
            });
        }
        if let Some(model) = &request.sampling.model {
            if !caps.supported_models.is_empty() && !caps.supports_model(model) {
                return Err(AppError::InvalidRequest {
                    field: "model".to_string(),
                    reason: format!("model {model} not supported by {}", self.id()),
                });
            }
        }
        Ok(())
    }

    /// Whether this provider can serve a request at all, independent of
    /// health: the suitability filter in `SelectBest` (§4.1).
    fn is_suitable_for(&self, request: &LlmRequest) -> bool {
        let caps = self.capabilities();
        if request.requires_streaming() && !caps.supports(Feature::Streaming) {
            return false;
        }
        if request.requires_tools() && !caps.supports(Feature::FunctionCalling) {
            return false;
        }
        if let Some(model) = &request.sampling.model {
            if !caps.supported_models.is_empty() && !caps.supports_model(model) {
                return false;
            }
        }
        true
    }
}
