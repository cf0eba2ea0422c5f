//! Alert rules evaluated against live protocol metrics, with per-rule
//! cooldown and a bounded alert history.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::metrics::ProtocolMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterThan,
    LessThan,
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertMetric {
    ErrorRate,
    AvgLatencyMs,
    ThroughputPerSec,
    TotalRequests,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone)]
pub struct AlertRule {
    pub id: Uuid,
    pub name: String,
    pub protocol: String,
    pub metric: AlertMetric,
    pub threshold: f64,
    pub comparison: Comparison,
    pub severity: Severity,
    pub cooldown: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub rule_name: String,
    pub protocol: String,
    pub severity: Severity,
    pub message: String,
    pub observed_value: f64,
    pub threshold: f64,
    pub triggered_at: DateTime<Utc>,
    pub resolved: bool,
}

/// `GetAlertsFiltered` criteria. `include_resolved` defaults to `false`
/// (only unresolved alerts surface unless explicitly asked for).
#[derive(Default)]
pub struct AlertFilter {
    pub protocol: Option<String>,
    pub severity: Option<Severity>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub max_count: Option<usize>,
    pub include_resolved: bool,
}

struct RuleState {
    rule: AlertRule,
    last_triggered: Option<Instant>,
}

pub struct AlertManager {
    rules: DashMap<Uuid, Mutex<RuleState>>,
    alerts: Mutex<VecDeque<Alert>>,
    limit: Mutex<usize>,
}

const DEFAULT_ALERT_LIMIT: usize = 1000;

impl Default for AlertManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertManager {
    pub fn new() -> Self {
        Self { rules: DashMap::new(), alerts: Mutex::new(VecDeque::new()), limit: Mutex::new(DEFAULT_ALERT_LIMIT) }
    }

    pub fn add_alert_rule(&self, rule: AlertRule) {
        let id = rule.id;
        self.rules.insert(id, Mutex::new(RuleState { rule, last_triggered: None }));
    }

    pub fn remove_alert_rule(&self, id: Uuid) -> bool {
        self.rules.remove(&id).is_some()
    }

    pub fn set_alert_limit(&self, n: usize) {
        *self.limit.lock() = n;
        let mut alerts = self.alerts.lock();
        while alerts.len() > n {
            alerts.pop_front();
        }
    }

    pub fn clear_alerts(&self) {
        self.alerts.lock().clear();
    }

    pub fn resolve_alert(&self, id: Uuid) -> bool {
        let mut alerts = self.alerts.lock();
        if let Some(alert) = alerts.iter_mut().find(|a| a.id == id) {
            alert.resolved = true;
            true
        } else {
            false
        }
    }

    /// Applies protocol, severity, `[start, end]` and resolved filters,
    /// returns most-recent-first, and truncates to `max_count` if set.
    pub fn get_alerts_filtered(&self, filter: &AlertFilter) -> Vec<Alert> {
        let mut matched: Vec<Alert> = self
            .alerts
            .lock()
            .iter()
            .filter(|a| filter.protocol.as_deref().map(|p| p == a.protocol).unwrap_or(true))
            .filter(|a| filter.severity.map(|s| s == a.severity).unwrap_or(true))
            .filter(|a| filter.start.map(|start| a.triggered_at >= start).unwrap_or(true))
            .filter(|a| filter.end.map(|end| a.triggered_at <= end).unwrap_or(true))
            .filter(|a| filter.include_resolved || !a.resolved)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        if let Some(max) = filter.max_count {
            matched.truncate(max);
        }
        matched
    }

    /// Evaluates every rule scoped to `metrics.protocol` against the
    /// snapshot, respecting each rule's cooldown, and appends a fresh alert
    /// to the bounded history for any breach.
    pub fn evaluate(&self, metrics: &ProtocolMetrics) {
        let now = Instant::now();
        for entry in self.rules.iter() {
            let mut state = entry.value().lock();
            if state.rule.protocol != metrics.protocol {
                continue;
            }
            if let Some(last) = state.last_triggered {
                if now.duration_since(last) < state.rule.cooldown {
                    continue;
                }
            }
            if breaches(&state.rule, metrics) {
                state.last_triggered = Some(now);
                self.push_alert(Alert {
                    id: Uuid::new_v4(),
                    rule_id: state.rule.id,
                    rule_name: state.rule.name.clone(),
                    protocol: metrics.protocol.clone(),
                    severity: state.rule.severity,
                    message: describe_breach(&state.rule, metrics),
                    observed_value: metric_value(state.rule.metric, metrics),
                    threshold: state.rule.threshold,
                    triggered_at: Utc::now(),
                    resolved: false,
                });
            }
        }
    }

    fn push_alert(&self, alert: Alert) {
        let limit = *self.limit.lock();
        let mut alerts = self.alerts.lock();
        if alerts.len() >= limit {
            alerts.pop_front();
        }
        alerts.push_back(alert);
    }
}

fn metric_value(metric: AlertMetric, metrics: &ProtocolMetrics) -> f64 {
    match metric {
        AlertMetric::ErrorRate => metrics.error_rate as f64,
        AlertMetric::AvgLatencyMs => metrics.avg_latency_ms,
        AlertMetric::ThroughputPerSec => metrics.throughput_per_sec as f64,
        AlertMetric::TotalRequests => metrics.request_count as f64,
    }
}

fn breaches(rule: &AlertRule, metrics: &ProtocolMetrics) -> bool {
    let value = metric_value(rule.metric, metrics);
    match rule.comparison {
        Comparison::GreaterThan => value > rule.threshold,
        Comparison::LessThan => value < rule.threshold,
        Comparison::Equal => value == rule.threshold,
    }
}

fn describe_breach(rule: &AlertRule, metrics: &ProtocolMetrics) -> String {
    format!(
        "{} on {}: observed {:.3}, threshold {:.3}",
        rule.name,
        metrics.protocol,
        metric_value(rule.metric, metrics),
        rule.threshold
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metrics(protocol: &str, error_rate: f32) -> ProtocolMetrics {
        ProtocolMetrics {
            protocol: protocol.to_string(),
            request_count: 10,
            success_count: 9,
            failure_count: 1,
            avg_latency_ms: 50.0,
            min_latency_ms: 10,
            max_latency_ms: 100,
            error_rate,
            throughput_per_sec: 1.0,
            active_connections: 0,
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    #[test]
    fn a_breaching_rule_produces_an_alert() {
        let manager = AlertManager::new();
        manager.add_alert_rule(AlertRule {
            id: Uuid::new_v4(),
            name: "high error rate".to_string(),
            protocol: "mcp".to_string(),
            metric: AlertMetric::ErrorRate,
            threshold: 0.1,
            comparison: Comparison::GreaterThan,
            severity: Severity::Warning,
            cooldown: Duration::from_secs(60),
        });
        manager.evaluate(&sample_metrics("mcp", 0.5));
        let alerts = manager.get_alerts_filtered(&AlertFilter::default());
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn cooldown_suppresses_repeat_alerts() {
        let manager = AlertManager::new();
        manager.add_alert_rule(AlertRule {
            id: Uuid::new_v4(),
            name: "high error rate".to_string(),
            protocol: "mcp".to_string(),
            metric: AlertMetric::ErrorRate,
            threshold: 0.1,
            comparison: Comparison::GreaterThan,
            severity: Severity::Warning,
            cooldown: Duration::from_secs(60),
        });
        manager.evaluate(&sample_metrics("mcp", 0.5));
        manager.evaluate(&sample_metrics("mcp", 0.5));
        assert_eq!(manager.get_alerts_filtered(&AlertFilter::default()).len(), 1);
    }

    #[test]
    fn alert_history_is_bounded() {
        let manager = AlertManager::new();
        manager.set_alert_limit(2);
        manager.add_alert_rule(AlertRule {
            id: Uuid::new_v4(),
            name: "x".to_string(),
            protocol: "mcp".to_string(),
            metric: AlertMetric::ErrorRate,
            threshold: -1.0,
            comparison: Comparison::GreaterThan,
            severity: Severity::Critical,
            cooldown: Duration::from_millis(0),
        });
        for _ in 0..5 {
            manager.evaluate(&sample_metrics("mcp", 0.5));
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(manager.get_alerts_filtered(&AlertFilter::default()).len() <= 2);
    }

    fn rule(protocol: &str, severity: Severity) -> AlertRule {
        AlertRule {
            id: Uuid::new_v4(),
            name: format!("{protocol}-{severity:?}"),
            protocol: protocol.to_string(),
            metric: AlertMetric::ErrorRate,
            threshold: 0.1,
            comparison: Comparison::GreaterThan,
            severity,
            cooldown: Duration::from_millis(0),
        }
    }

    #[test]
    fn severity_filter_narrows_results() {
        let manager = AlertManager::new();
        manager.add_alert_rule(rule("mcp", Severity::Warning));
        manager.add_alert_rule(rule("http", Severity::Critical));
        manager.evaluate(&sample_metrics("mcp", 0.5));
        manager.evaluate(&sample_metrics("http", 0.5));

        let critical_only = manager.get_alerts_filtered(&AlertFilter { severity: Some(Severity::Critical), ..Default::default() });
        assert_eq!(critical_only.len(), 1);
        assert_eq!(critical_only[0].protocol, "http");
    }

    #[test]
    fn resolved_alerts_are_excluded_unless_requested() {
        let manager = AlertManager::new();
        manager.add_alert_rule(rule("mcp", Severity::Warning));
        manager.evaluate(&sample_metrics("mcp", 0.5));
        let id = manager.get_alerts_filtered(&AlertFilter::default())[0].id;
        manager.resolve_alert(id);

        assert!(manager.get_alerts_filtered(&AlertFilter::default()).is_empty());
        assert_eq!(manager.get_alerts_filtered(&AlertFilter { include_resolved: true, ..Default::default() }).len(), 1);
    }

    #[test]
    fn results_are_most_recent_first_and_truncated_by_max_count() {
        let manager = AlertManager::new();
        manager.add_alert_rule(rule("mcp", Severity::Warning));
        for _ in 0..3 {
            manager.evaluate(&sample_metrics("mcp", 0.5));
            std::thread::sleep(Duration::from_millis(2));
        }
        let all = manager.get_alerts_filtered(&AlertFilter::default());
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].triggered_at >= w[1].triggered_at));

        let limited = manager.get_alerts_filtered(&AlertFilter { max_count: Some(1), ..Default::default() });
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, all[0].id, "truncation keeps the most recent alert");
    }

    #[test]
    fn total_requests_equal_comparison_fires_on_an_exact_match() {
        let manager = AlertManager::new();
        manager.add_alert_rule(AlertRule {
            id: Uuid::new_v4(),
            name: "exact volume".to_string(),
            protocol: "mcp".to_string(),
            metric: AlertMetric::TotalRequests,
            threshold: 10.0,
            comparison: Comparison::Equal,
            severity: Severity::Info,
            cooldown: Duration::from_millis(0),
        });
        manager.evaluate(&sample_metrics("mcp", 0.0));
        assert_eq!(manager.get_alerts_filtered(&AlertFilter::default()).len(), 1);
    }

    #[test]
    fn time_window_filter_excludes_alerts_outside_the_range() {
        let manager = AlertManager::new();
        manager.add_alert_rule(rule("mcp", Severity::Warning));
        manager.evaluate(&sample_metrics("mcp", 0.5));
        let future_start = Utc::now() + chrono::Duration::hours(1);
        let none = manager.get_alerts_filtered(&AlertFilter { start: Some(future_start), ..Default::default() });
        assert!(none.is_empty());
    }
}
