//! Input validation, rate limiting, content filtering and PII handling for
//! debate requests.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::DebateConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone)]
pub struct SecurityViolation {
    pub severity: Severity,
    pub message: String,
}

const MAX_TOPIC_LEN: usize = 10_000;

/// Rejects configurations that cannot safely enter the state machine.
/// Mirrors §4.8's validation rule list in order, returning the first
/// violation encountered.
pub fn validate_config(config: &DebateConfig) -> Result<(), SecurityViolation> {
    if config.id.trim().is_empty() {
        return Err(SecurityViolation { severity: Severity::Medium, message: "debate id must not be empty".to_string() });
    }
    if config.topic.len() > MAX_TOPIC_LEN {
        return Err(SecurityViolation {
            severity: Severity::Low,
            message: format!("topic exceeds max length of {MAX_TOPIC_LEN}"),
        });
    }
    if !(1..=100).contains(&config.max_rounds) {
        return Err(SecurityViolation {
            severity: Severity::Medium,
            message: "max_rounds must be in [1, 100]".to_string(),
        });
    }
    if config.participants.is_empty() {
        return Err(SecurityViolation { severity: Severity::Medium, message: "participants must not be empty".to_string() });
    }
    for participant in &config.participants {
        if participant.id.trim().is_empty() || participant.name.trim().is_empty() {
            return Err(SecurityViolation {
                severity: Severity::Medium,
                message: "every participant needs a non-empty id and name".to_string(),
            });
        }
    }
    Ok(())
}

/// Sliding-window rate limiter, independent per key.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window, hits: Mutex::new(HashMap::new()) }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Returns `true` if the call for `key` is admitted under the limit.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock();
        let entry = hits.entry(key.to_string()).or_default();
        while let Some(&front) = entry.front() {
            if now.duration_since(front) > self.window {
                entry.pop_front();
            } else {
                break;
            }
        }
        if entry.len() as u32 >= self.limit {
            false
        } else {
            entry.push_back(now);
            true
        }
    }
}

/// Pre-compiled blocked substrings. A real deployment would use a regex
/// set; substring matching is sufficient here and keeps the dependency
/// surface aligned with the rest of this crate.
pub struct ContentFilter {
    blocked: Vec<String>,
}

impl ContentFilter {
    pub fn new(blocked: Vec<String>) -> Self {
        Self { blocked: blocked.into_iter().map(|s| s.to_lowercase()).collect() }
    }

    pub fn topic_is_blocked(&self, topic: &str) -> bool {
        let lowered = topic.to_lowercase();
        self.blocked.iter().any(|pattern| lowered.contains(pattern.as_str()))
    }

    pub fn sanitize(&self, text: &str) -> String {
        let mut result = text.to_string();
        for pattern in &self.blocked {
            if pattern.is_empty() {
                continue;
            }
            result = replace_case_insensitive(&result, pattern, "[FILTERED]");
        }
        result
    }
}

fn replace_case_insensitive(haystack: &str, pattern: &str, replacement: &str) -> String {
    let lowered = haystack.to_lowercase();
    let mut result = String::new();
    let mut rest = haystack;
    let mut lowered_rest = lowered.as_str();
    while let Some(pos) = lowered_rest.find(pattern) {
        result.push_str(&rest[..pos]);
        result.push_str(replacement);
        rest = &rest[pos + pattern.len()..];
        lowered_rest = &lowered_rest[pos + pattern.len()..];
    }
    result.push_str(rest);
    result
}

/// Flags PII in a topic (warning only, not a rejection) and masks it in
/// responses by keeping the last 4 characters.
pub struct PiiGuard {
    patterns: Vec<regex::Regex>,
}

impl Default for PiiGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl PiiGuard {
    pub fn new() -> Self {
        let patterns = vec![
            regex::Regex::new(r"\d{3}-\d{2}-\d{4}").expect("valid SSN pattern"),
            regex::Regex::new(r"\d{16}").expect("valid card pattern"),
        ];
        Self { patterns }
    }

    pub fn topic_contains_pii(&self, topic: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(topic))
    }

    pub fn mask_response(&self, text: &str) -> String {
        let mut result = text.to_string();
        for pattern in &self.patterns {
            result = pattern
                .replace_all(&result, |caps: &regex::Captures| mask_keep_last_four(&caps[0]))
                .to_string();
        }
        result
    }
}

fn mask_keep_last_four(matched: &str) -> String {
    let len = matched.chars().count();
    if len <= 4 {
        return matched.to_string();
    }
    let keep_from = len - 4;
    matched
        .chars()
        .enumerate()
        .map(|(i, c)| if i < keep_from { '*' } else { c })
        .collect()
}
