use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single turn in a chat-style request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Sampling parameters carried on every request, independent of which
/// provider ultimately serves it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingParams {
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub stop: Vec<String>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self { model: None, temperature: 0.7, max_tokens: 1000, top_p: 1.0, stop: Vec::new() }
    }
}

/// Named ensemble/voting strategy tags understood by `providers` and
/// `ensemble`. Unknown strategy names fall back to `Basic`/`ConfidenceWeighted`
/// at the call site rather than failing to deserialize, so this stays a plain
/// string newtype instead of a closed enum at the wire boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    pub strategy: String,
    pub voting_strategy: String,
    pub min_providers: usize,
    pub confidence_threshold: f32,
    pub fallback_to_best: bool,
    pub timeout_seconds: u64,
    pub preferred_providers: Vec<String>,
    pub strict_preferred: bool,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            strategy: "basic".to_string(),
            voting_strategy: "confidence_weighted".to_string(),
            min_providers: 1,
            confidence_threshold: 0.0,
            fallback_to_best: true,
            timeout_seconds: 30,
            preferred_providers: Vec::new(),
            strict_preferred: false,
        }
    }
}

/// A single inbound request to the orchestrator.
///
/// Invariant: exactly one of `prompt` or a non-empty `messages` is the
/// effective input; if both are set, `messages` takes precedence (see
/// [`LlmRequest::effective_messages`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub id: Uuid,
    pub session_id: Uuid,
    pub prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub sampling: SamplingParams,
    pub ensemble: EnsembleConfig,
    pub memory_enhanced: bool,
    pub tools: Vec<String>,
    pub stream: bool,
    pub created_at: DateTime<Utc>,
}

impl LlmRequest {
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            prompt: Some(prompt.into()),
            messages: Vec::new(),
            sampling: SamplingParams::default(),
            ensemble: EnsembleConfig::default(),
            memory_enhanced: false,
            tools: Vec::new(),
            stream: false,
            created_at: Utc::now(),
        }
    }

    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            prompt: None,
            messages,
            sampling: SamplingParams::default(),
            ensemble: EnsembleConfig::default(),
            memory_enhanced: false,
            tools: Vec::new(),
            stream: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_ensemble(mut self, ensemble: EnsembleConfig) -> Self {
        self.ensemble = ensemble;
        self
    }

    /// Messages take precedence over a bare prompt when both are set.
    pub fn effective_messages(&self) -> Vec<ChatMessage> {
        if !self.messages.is_empty() {
            return self.messages.clone();
        }
        self.prompt
            .as_ref()
            .map(|p| vec![ChatMessage::user(p.clone())])
            .unwrap_or_default()
    }

    pub fn requires_streaming(&self) -> bool {
        self.stream
    }

    pub fn requires_tools(&self) -> bool {
        !self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_take_precedence_over_prompt() {
        let req = LlmRequest {
            messages: vec![ChatMessage::user("from messages")],
            ..LlmRequest::from_prompt("from prompt")
        };
        let effective = req.effective_messages();
        assert_eq!(effective.len(), 1);
        assert_eq!(effective[0].content, "from messages");
    }

    #[test]
    fn bare_prompt_becomes_a_single_user_message() {
        let req = LlmRequest::from_prompt("hello");
        let effective = req.effective_messages();
        assert_eq!(effective.len(), 1);
        assert_eq!(effective[0].role, Role::User);
    }
}
