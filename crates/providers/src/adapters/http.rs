//! A hosted HTTP provider adaptation: talks to an OpenAI-compatible or
//! Anthropic-compatible chat endpoint. One struct covers both wire styles
//! since the suitability/health/retry logic is identical; only request and
//! response JSON shapes differ.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use core::{AppError, ChatMessage, FinishReason, LlmRequest, LlmResponse, Role};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capability::{Feature, ProviderCapabilities, ProviderId};
use crate::provider::Provider;
use crate::retry::{self, RetryConfig};

/// Which vendor's request/response envelope to speak on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStyle {
    OpenAiCompatible,
    AnthropicCompatible,
}

#[derive(Debug)]
pub struct HostedHttpProvider {
    id: ProviderId,
    style: ApiStyle,
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
    timeout: Duration,
    retry: RetryConfig,
    capabilities: ProviderCapabilities,
}

impl HostedHttpProvider {
    pub fn new(
        id: ProviderId,
        style: ApiStyle,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        capabilities: ProviderCapabilities,
    ) -> Self {
        Self {
            id,
            style,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(60),
            retry: RetryConfig::default(),
            capabilities,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn complete_once(
        &self,
        messages: &[ChatMessage],
        request: &LlmRequest,
    ) -> Result<LlmResponse, AppError> {
        let started = Instant::now();
        let body = match self.style {
            ApiStyle::OpenAiCompatible => self.complete_openai(messages, request).await,
            ApiStyle::AnthropicCompatible => self.complete_anthropic(messages, request).await,
        }?;
        Ok(body.with_response_time_ms(started.elapsed().as_millis() as u64))
    }

    async fn complete_openai(
        &self,
        messages: &[ChatMessage],
        request: &LlmRequest,
    ) -> Result<LlmResponse, AppError> {
        #[derive(Serialize)]
        struct WireMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<WireMessage<'a>>,
            temperature: f32,
            max_tokens: u32,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMessage,
            finish_reason: Option<String>,
        }
        #[derive(Deserialize)]
        struct ChoiceMessage {
            content: String,
        }
        #[derive(Deserialize)]
        struct Usage {
            total_tokens: u32,
        }
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
            usage: Option<Usage>,
        }

        let model = request.sampling.model.clone().unwrap_or_else(|| self.id.model.clone());
        let wire_messages: Vec<WireMessage> = messages
            .iter()
            .map(|m| WireMessage { role: role_str(m.role), content: &m.content })
            .collect();

        let body = ChatRequest {
            model: &model,
            messages: wire_messages,
            temperature: request.sampling.temperature,
            max_tokens: request.sampling.max_tokens,
        };

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&self.id, e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_http_status(&self.id, status.as_u16(), text));
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| classify_reqwest_error(&self.id, e))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::ProviderFatal {
                provider: self.id.to_string(),
                message: "empty choices array".to_string(),
            })?;

        let finish = match choice.finish_reason.as_deref() {
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };

        Ok(LlmResponse::new(request.id, self.id.to_string(), self.display_name(), choice.message.content)
            .with_tokens(parsed.usage.map(|u| u.total_tokens).unwrap_or(0))
            .with_finish_reason(finish))
    }

    async fn complete_anthropic(
        &self,
        messages: &[ChatMessage],
        request: &LlmRequest,
    ) -> Result<LlmResponse, AppError> {
        #[derive(Serialize)]
        struct WireMessage<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct MessagesRequest<'a> {
            model: &'a str,
            max_tokens: u32,
            temperature: f32,
            system: Option<&'a str>,
            messages: Vec<WireMessage<'a>>,
        }
        #[derive(Deserialize)]
        struct ContentBlock {
            text: String,
        }
        #[derive(Deserialize)]
        struct Usage {
            input_tokens: u32,
            output_tokens: u32,
        }
        #[derive(Deserialize)]
        struct MessagesResponse {
            content: Vec<ContentBlock>,
            stop_reason: Option<String>,
            usage: Usage,
        }

        let model = request.sampling.model.clone().unwrap_or_else(|| self.id.model.clone());
        let system = messages.iter().find(|m| m.role == Role::System).map(|m| m.content.as_str());
        let turns: Vec<WireMessage> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| WireMessage { role: role_str(m.role), content: &m.content })
            .collect();

        let body = MessagesRequest {
            model: &model,
            max_tokens: request.sampling.max_tokens,
            temperature: request.sampling.temperature,
            system,
            messages: turns,
        };

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.endpoint))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&self.id, e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_http_status(&self.id, status.as_u16(), text));
        }

        let parsed: MessagesResponse = resp.json().await.map_err(|e| classify_reqwest_error(&self.id, e))?;
        let content = parsed.content.into_iter().map(|c| c.text).collect::<Vec<_>>().join("");
        let finish = match parsed.stop_reason.as_deref() {
            Some("max_tokens") => FinishReason::Length,
            _ => FinishReason::Stop,
        };

        Ok(LlmResponse::new(request.id, self.id.to_string(), self.display_name(), content)
            .with_tokens(parsed.usage.input_tokens + parsed.usage.output_tokens)
            .with_finish_reason(finish))
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn classify_reqwest_error(id: &ProviderId, error: reqwest::Error) -> AppError {
    if error.is_timeout() || error.is_connect() {
        AppError::ProviderTransient { provider: id.to_string(), message: error.to_string() }
    } else {
        AppError::ProviderFatal { provider: id.to_string(), message: error.to_string() }
    }
}

/// Maps HTTP status onto the §7 transient/fatal split: 429 and 5xx are
/// retried; everything else (4xx) is fatal.
fn classify_http_status(id: &ProviderId, status: u16, body: String) -> AppError {
    match status {
        429 | 500..=599 => AppError::ProviderTransient {
            provider: id.to_string(),
            message: format!("http {status}: {body}"),
        },
        _ => AppError::ProviderFatal {
            provider: id.to_string(),
            message: format!("http {status}: {body}"),
        },
    }
}

#[async_trait]
impl Provider for HostedHttpProvider {
    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let resp = self
            .client
            .head(&self.endpoint)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&self.id, e))?;
        if resp.status().is_server_error() {
            return Err(AppError::ProviderTransient {
                provider: self.id.to_string(),
                message: format!("health probe returned {}", resp.status()),
            });
        }
        Ok(())
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, AppError> {
        self.validate_request(request)?;
        let messages = request.effective_messages();

        let outcome = retry::run_with_retry(&self.retry, || async {
            self.complete_once(&messages, request).await
        })
        .await;

        match outcome {
            Ok(response) => Ok(response),
            Err(err) => {
                warn!(provider = %self.id, error = %err, "request exhausted retries");
                Err(err)
            }
        }
    }
}

impl HostedHttpProvider {
    /// A capability set typical of the "coding"/"reasoning" tier hosted
    /// chat models, used by callers building a default registration.
    pub fn default_capabilities(models: Vec<String>) -> ProviderCapabilities {
        debug!("building default hosted-HTTP capability set");
        ProviderCapabilities::new(models)
            .with_feature(Feature::Streaming)
            .with_feature(Feature::FunctionCalling)
            .with_feature(Feature::Reasoning)
    }
}
