//! A local inference endpoint adaptation (Ollama/LM Studio style): no
//! credentials, no retry-worthy rate limiting, generally `UltraFast` or
//! `Fast` latency class.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use core::{AppError, FinishReason, LlmRequest, LlmResponse};
use serde::{Deserialize, Serialize};

use crate::capability::{LatencyClass, ProviderCapabilities, ProviderId};
use crate::provider::Provider;

#[derive(Debug)]
pub struct LocalProvider {
    id: ProviderId,
    endpoint: String,
    client: reqwest::Client,
    capabilities: ProviderCapabilities,
}

impl LocalProvider {
    pub fn new(id: ProviderId, endpoint: impl Into<String>) -> Self {
        let mut capabilities = ProviderCapabilities::new(vec![id.model.clone()]);
        capabilities.latency_class = LatencyClass::Fast;
        capabilities.pricing = None;
        Self { id, endpoint: endpoint.into(), client: reqwest::Client::new(), capabilities }
    }
}

#[async_trait]
impl Provider for LocalProvider {
    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .head(&self.endpoint)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| AppError::ProviderTransient {
                provider: self.id.to_string(),
                message: e.to_string(),
            })
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, AppError> {
        self.validate_request(request)?;

        #[derive(Serialize)]
        struct GenerateRequest<'a> {
            model: &'a str,
            prompt: &'a str,
            stream: bool,
        }
        #[derive(Deserialize)]
        struct GenerateResponse {
            response: String,
        }

        let prompt = request
            .effective_messages()
            .into_iter()
            .map(|m| m.content)
            .collect::<Vec<_>>()
            .join("\n");

        let started = Instant::now();
        let resp = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&GenerateRequest { model: &self.id.model, prompt: &prompt, stream: false })
            .send()
            .await
            .map_err(|e| AppError::ProviderTransient {
                provider: self.id.to_string(),
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(AppError::ProviderFatal {
                provider: self.id.to_string(),
                message: format!("local endpoint returned {}", resp.status()),
            });
        }

        let parsed: GenerateResponse = resp.json().await.map_err(|e| AppError::ProviderFatal {
            provider: self.id.to_string(),
            message: e.to_string(),
        })?;

        Ok(LlmResponse::new(request.id, self.id.to_string(), self.display_name(), parsed.response)
            .with_response_time_ms(started.elapsed().as_millis() as u64)
            .with_finish_reason(FinishReason::Stop))
    }
}
