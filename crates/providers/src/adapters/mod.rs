pub mod http;
pub mod local;

use async_trait::async_trait;
use core::{AppError, LlmRequest, LlmResponse};

use crate::capability::{ProviderCapabilities, ProviderId};
use crate::provider::Provider;

pub use http::{ApiStyle, HostedHttpProvider};
pub use local::LocalProvider;

/// The closed set of concrete provider adaptations, matched exhaustively
/// everywhere dispatch needs a concrete type instead of a trait object (the
/// "tagged-variant" redesign from §9 of the design notes).
#[derive(Debug)]
pub enum ProviderWrapper {
    Hosted(HostedHttpProvider),
    Local(LocalProvider),
}

#[async_trait]
impl Provider for ProviderWrapper {
    fn id(&self) -> ProviderId {
        match self {
            ProviderWrapper::Hosted(p) => p.id(),
            ProviderWrapper::Local(p) => p.id(),
        }
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        match self {
            ProviderWrapper::Hosted(p) => p.capabilities(),
            ProviderWrapper::Local(p) => p.capabilities(),
        }
    }

    async fn health_check(&self) -> Result<(), AppError> {
        match self {
            ProviderWrapper::Hosted(p) => p.health_check().await,
            ProviderWrapper::Local(p) => p.health_check().await,
        }
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, AppError> {
        match self {
            ProviderWrapper::Hosted(p) => p.complete(request).await,
            ProviderWrapper::Local(p) => p.complete(request).await,
        }
    }
}
