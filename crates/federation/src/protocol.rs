//! The `FederatedProtocol` contract every backend (MCP, LSP, ACP, embedding)
//! implements to plug into the fabric.

use std::collections::HashMap;

use async_trait::async_trait;
use core::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatedRequest {
    pub source: String,
    pub target: String,
    pub action: String,
    pub data: serde_json::Value,
    pub correlation_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatedResponse {
    pub protocol: String,
    pub data: serde_json::Value,
    pub correlation_id: Uuid,
}

#[async_trait]
pub trait FederatedProtocol: Send + Sync {
    fn name(&self) -> &str;

    async fn handle_federated_request(&self, req: &FederatedRequest) -> Result<FederatedResponse, AppError>;

    async fn publish_event(&self, event: &FederatedEvent) -> Result<(), AppError>;

    fn capabilities(&self) -> HashMap<String, String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatedEvent {
    pub id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub source: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl FederatedEvent {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            payload,
            source: source.into(),
            created_at: chrono::Utc::now(),
        }
    }
}
