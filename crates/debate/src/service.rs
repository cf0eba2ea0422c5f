//! Ties debate configuration, state, security and audit together behind a
//! single entry point used by callers driving a multi-round debate.

use std::future::Future;

use core::AppError;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::audit::AuditLog;
use crate::config::{DebateConfig, RecoveryConfig};
use crate::security::{ContentFilter, PiiGuard, RateLimiter};
use crate::state::{DebateState, DebateStats, DebateStatus};

pub struct DebateService {
    debates: DashMap<String, Mutex<DebateState>>,
    recovery: RecoveryConfig,
    rate_limiter: RateLimiter,
    content_filter: ContentFilter,
    pii_guard: PiiGuard,
    audit: AuditLog,
}

impl DebateService {
    pub fn new(recovery: RecoveryConfig, blocked_terms: Vec<String>) -> Self {
        Self {
            debates: DashMap::new(),
            recovery,
            rate_limiter: RateLimiter::per_minute(100),
            content_filter: ContentFilter::new(blocked_terms),
            pii_guard: PiiGuard::new(),
            audit: AuditLog::new(),
        }
    }

    pub fn register_debate(&self, config: DebateConfig, caller_key: &str) -> Result<(), AppError> {
        if !self.rate_limiter.check(caller_key) {
            return Err(AppError::RateLimitExceeded { retry_after_secs: 60 });
        }
        crate::security::validate_config(&config).map_err(|v| AppError::SecurityViolation(v.message))?;
        if self.content_filter.topic_is_blocked(&config.topic) {
            return Err(AppError::SecurityViolation(format!("topic for debate {} contains blocked content", config.id)));
        }
        if self.pii_guard.topic_contains_pii(&config.topic) {
            warn!(debate_id = %config.id, "topic appears to contain PII; proceeding with a warning");
        }
        if self.debates.contains_key(&config.id) {
            return Err(AppError::DuplicateDebate(config.id));
        }
        let id = config.id.clone();
        self.audit.append(&id, "register", &format!("topic={}", config.topic));
        self.debates.insert(id, Mutex::new(DebateState::new(config)));
        Ok(())
    }

    pub fn update_debate_progress(&self, id: &str, response: serde_json::Value) -> Result<u32, AppError> {
        let entry = self.debates.get(id).ok_or_else(|| AppError::ProviderNotFound(id.to_string()))?;
        let mut state = entry.lock();
        if state.status.is_terminal() {
            return Err(AppError::DebateAlreadyCompleted { id: id.to_string() });
        }
        let masked = mask_response_value(&self.pii_guard, response);
        state.responses.push(masked);
        state.round += 1;
        state.last_updated = chrono::Utc::now();
        let round = state.round;
        drop(state);
        self.audit.append(id, "round_advanced", &format!("round={round}"));
        Ok(round)
    }

    /// Succeeds from any non-terminal state; a debate already completed is
    /// a no-op rather than an error.
    pub fn complete_debate(&self, id: &str) -> Result<(), AppError> {
        let entry = self.debates.get(id).ok_or_else(|| AppError::ProviderNotFound(id.to_string()))?;
        let mut state = entry.lock();
        if state.status == DebateStatus::Completed {
            return Ok(());
        }
        state.status = DebateStatus::Completed;
        state.last_updated = chrono::Utc::now();
        drop(state);
        self.audit.append(id, "completed", "debate finished");
        info!(debate_id = id, "debate completed");
        Ok(())
    }

    pub fn handle_debate_failure(&self, id: &str, error: &str) -> Result<(), AppError> {
        let entry = self.debates.get(id).ok_or_else(|| AppError::ProviderNotFound(id.to_string()))?;
        let mut state = entry.lock();
        state.status = DebateStatus::Failed;
        state.failure_count += 1;
        state.last_error = Some(error.to_string());
        state.last_updated = chrono::Utc::now();
        drop(state);
        self.audit.append(id, "failed", error);
        warn!(debate_id = id, error, "debate marked failed");
        Ok(())
    }

    /// Retries `attempt` up to `recovery.max_retries` times with exponential
    /// backoff, transitioning through `Recovering` while a retry is
    /// in flight. Succeeds by moving the debate back to `Active`; gives up
    /// once the retry budget is exhausted.
    pub async fn recover_debate<F, Fut>(&self, id: &str, mut attempt: F) -> Result<(), AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), AppError>>,
    {
        {
            let entry = self.debates.get(id).ok_or_else(|| AppError::ProviderNotFound(id.to_string()))?;
            let state = entry.lock();
            if state.status == DebateStatus::Completed {
                return Err(AppError::DebateAlreadyCompleted { id: id.to_string() });
            }
            if state.recovery_attempts >= self.recovery.max_retries {
                return Err(AppError::DebateMaxRecoveryAttempts { id: id.to_string() });
            }
        }

        let mut delay = self.recovery.retry_delay;
        loop {
            {
                let entry = self.debates.get(id).ok_or_else(|| AppError::ProviderNotFound(id.to_string()))?;
                let mut state = entry.lock();
                state.status = DebateStatus::Recovering;
                state.recovery_attempts += 1;
                state.last_updated = chrono::Utc::now();
            }
            self.audit.append(id, "recovery_attempted", &format!("attempt={delay:?}"));

            match attempt().await {
                Ok(()) => {
                    let entry = self.debates.get(id).ok_or_else(|| AppError::ProviderNotFound(id.to_string()))?;
                    let mut state = entry.lock();
                    state.status = DebateStatus::Active;
                    state.last_error = None;
                    state.last_updated = chrono::Utc::now();
                    drop(state);
                    self.audit.append(id, "recovered", "recovery succeeded");
                    return Ok(());
                }
                Err(err) => {
                    let entry = self.debates.get(id).ok_or_else(|| AppError::ProviderNotFound(id.to_string()))?;
                    let mut state = entry.lock();
                    state.status = DebateStatus::Failed;
                    state.last_error = Some(err.to_string());
                    let attempts_so_far = state.recovery_attempts;
                    drop(state);
                    if attempts_so_far >= self.recovery.max_retries {
                        self.audit.append(id, "recovery_exhausted", &err.to_string());
                        return Err(AppError::DebateMaxRecoveryAttempts { id: id.to_string() });
                    }
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    pub fn get_debate_state(&self, id: &str) -> Option<DebateState> {
        self.debates.get(id).map(|entry| entry.lock().clone())
    }

    /// Ids whose status is `Active` or `Recovering`. `Failed` debates are
    /// excluded: they are neither actively progressing nor terminal.
    pub fn list_active_debates(&self) -> Vec<String> {
        self.debates
            .iter()
            .filter(|entry| matches!(entry.value().lock().status, DebateStatus::Active | DebateStatus::Recovering))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Drops `Completed` debates whose `last_updated` is older than
    /// `min_age`, leaving active/recovering/recently-completed ones in
    /// place, and returns how many were removed.
    pub fn cleanup_completed_debates(&self, min_age: chrono::Duration) -> usize {
        let cutoff = chrono::Utc::now() - min_age;
        let completed: Vec<String> = self
            .debates
            .iter()
            .filter(|entry| {
                let state = entry.value().lock();
                state.status == DebateStatus::Completed && state.last_updated < cutoff
            })
            .map(|entry| entry.key().clone())
            .collect();
        for id in &completed {
            self.debates.remove(id);
        }
        completed.len()
    }

    pub fn get_stats(&self) -> DebateStats {
        let mut stats = DebateStats::default();
        for entry in self.debates.iter() {
            stats.total += 1;
            match entry.value().lock().status {
                DebateStatus::Active => stats.active += 1,
                DebateStatus::Failed => stats.failed += 1,
                DebateStatus::Recovering => stats.recovering += 1,
                DebateStatus::Completed => stats.completed += 1,
            }
        }
        stats
    }

    pub fn audit_entries_for(&self, id: &str) -> Vec<crate::audit::AuditEntry> {
        self.audit.entries_for(id)
    }

    pub fn verify_audit_integrity(&self) -> Vec<u64> {
        self.audit.verify_integrity()
    }
}

fn mask_response_value(guard: &PiiGuard, value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(text) => serde_json::Value::String(guard.mask_response(&text)),
        serde_json::Value::Object(map) => {
            serde_json::Value::Object(map.into_iter().map(|(k, v)| (k, mask_response_value(guard, v))).collect())
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(|v| mask_response_value(guard, v)).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Participant;

    fn config(id: &str) -> DebateConfig {
        DebateConfig {
            id: id.to_string(),
            topic: "clean energy policy".to_string(),
            max_rounds: 5,
            participants: vec![Participant { id: "p1".to_string(), name: "Alice".to_string() }],
            checkpoint_enabled: false,
        }
    }

    fn service() -> DebateService {
        DebateService::new(RecoveryConfig { max_retries: 2, retry_delay: std::time::Duration::from_millis(1) }, vec!["forbidden".to_string()])
    }

    #[test]
    fn register_then_progress_then_complete() {
        let svc = service();
        svc.register_debate(config("d1"), "caller").unwrap();
        let round = svc.update_debate_progress("d1", serde_json::json!({"text": "hello"})).unwrap();
        assert_eq!(round, 1);
        svc.complete_debate("d1").unwrap();
        assert!(svc.update_debate_progress("d1", serde_json::json!("x")).is_err());
    }

    #[test]
    fn completing_an_already_completed_debate_is_a_no_op() {
        let svc = service();
        svc.register_debate(config("d1b"), "caller").unwrap();
        svc.complete_debate("d1b").unwrap();
        svc.complete_debate("d1b").unwrap();
        assert_eq!(svc.get_debate_state("d1b").unwrap().status, DebateStatus::Completed);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let svc = service();
        svc.register_debate(config("d1"), "caller").unwrap();
        assert!(svc.register_debate(config("d1"), "caller").is_err());
    }

    #[test]
    fn blocked_topic_is_rejected() {
        let svc = service();
        let mut c = config("d2");
        c.topic = "this is forbidden".to_string();
        assert!(svc.register_debate(c, "caller").is_err());
    }

    #[tokio::test]
    async fn recovery_succeeds_and_returns_to_active() {
        let svc = service();
        svc.register_debate(config("d3"), "caller").unwrap();
        svc.handle_debate_failure("d3", "boom").unwrap();
        svc.recover_debate("d3", || async { Ok(()) }).await.unwrap();
        assert_eq!(svc.get_debate_state("d3").unwrap().status, DebateStatus::Active);
    }

    #[tokio::test]
    async fn recovery_gives_up_after_max_retries() {
        let svc = service();
        svc.register_debate(config("d4"), "caller").unwrap();
        svc.handle_debate_failure("d4", "boom").unwrap();
        let result = svc.recover_debate("d4", || async { Err(AppError::ProviderFatal { provider: "p".into(), message: "still broken".into() }) }).await;
        assert!(result.is_err());
    }

    #[test]
    fn stats_count_by_status() {
        let svc = service();
        svc.register_debate(config("d5"), "caller").unwrap();
        svc.register_debate(config("d6"), "caller").unwrap();
        svc.complete_debate("d5").unwrap();
        let stats = svc.get_stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.active, 1);
    }

    #[test]
    fn cleanup_removes_only_completed_past_the_age_threshold() {
        let svc = service();
        svc.register_debate(config("d7"), "caller").unwrap();
        svc.register_debate(config("d7b"), "caller").unwrap();
        svc.complete_debate("d7").unwrap();
        assert_eq!(svc.cleanup_completed_debates(chrono::Duration::zero()), 1);
        assert!(svc.get_debate_state("d7").is_none());
        assert!(svc.get_debate_state("d7b").is_some(), "active debates survive cleanup");
    }

    #[test]
    fn audit_chain_is_intact_after_a_full_lifecycle() {
        let svc = service();
        svc.register_debate(config("d8"), "caller").unwrap();
        svc.update_debate_progress("d8", serde_json::json!("hi")).unwrap();
        svc.complete_debate("d8").unwrap();
        assert!(svc.verify_audit_integrity().is_empty());
        assert_eq!(svc.audit_entries_for("d8").len(), 3);
    }
}
