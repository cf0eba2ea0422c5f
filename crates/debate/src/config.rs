//! Debate registration input and the recovery tuning it carries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateConfig {
    pub id: String,
    pub topic: String,
    pub max_rounds: u32,
    pub participants: Vec<Participant>,
    pub checkpoint_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self { max_retries: 3, retry_delay: Duration::from_secs(2) }
    }
}
