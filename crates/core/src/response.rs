use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Error,
}

/// One provider's answer to an [`crate::LlmRequest`].
///
/// `selected` and `selection_score` start unset and are populated by the
/// ensemble engine after voting; they are not meaningful before that point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    pub provider_id: String,
    pub provider_name: String,
    pub content: String,
    pub confidence: f32,
    pub tokens_used: u32,
    pub response_time_ms: u64,
    pub finish_reason: FinishReason,
    pub created_at: DateTime<Utc>,
    pub selected: bool,
    pub selection_score: Option<f32>,
}

impl LlmResponse {
    pub fn new(
        request_id: Uuid,
        provider_id: impl Into<String>,
        provider_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            provider_id: provider_id.into(),
            provider_name: provider_name.into(),
            content: content.into(),
            confidence: 1.0,
            tokens_used: 0,
            response_time_ms: 0,
            finish_reason: FinishReason::Stop,
            created_at: Utc::now(),
            selected: false,
            selection_score: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.tokens_used = tokens;
        self
    }

    pub fn with_response_time_ms(mut self, ms: u64) -> Self {
        self.response_time_ms = ms;
        self
    }

    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = reason;
        self
    }

    pub fn is_error(&self) -> bool {
        self.finish_reason == FinishReason::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped_into_unit_interval() {
        let r = LlmResponse::new(Uuid::new_v4(), "p", "P", "hi").with_confidence(1.7);
        assert_eq!(r.confidence, 1.0);
        let r = LlmResponse::new(Uuid::new_v4(), "p", "P", "hi").with_confidence(-0.3);
        assert_eq!(r.confidence, 0.0);
    }
}
