//! Debate state machine: `active -> (failed | completed | recovering) ->
//! (completed | failed)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DebateConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DebateStatus {
    Active,
    Failed,
    Recovering,
    Completed,
}

impl DebateStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DebateStatus::Completed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateState {
    pub config: DebateConfig,
    pub status: DebateStatus,
    pub round: u32,
    pub responses: Vec<serde_json::Value>,
    pub failure_count: u32,
    pub recovery_attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl DebateState {
    pub fn new(config: DebateConfig) -> Self {
        let now = Utc::now();
        Self {
            config,
            status: DebateStatus::Active,
            round: 0,
            responses: Vec::new(),
            failure_count: 0,
            recovery_attempts: 0,
            last_error: None,
            created_at: now,
            last_updated: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DebateStats {
    pub total: usize,
    pub active: usize,
    pub failed: usize,
    pub recovering: usize,
    pub completed: usize,
}
