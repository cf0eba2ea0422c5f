//! Bounded store of `ContextEntry` values with relevance-scored context
//! assembly and priority/recency eviction, mirroring the bounded-history +
//! explicit-eviction-score shape used for resource usage tracking elsewhere
//! in this workspace.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::entry::ContextEntry;

pub const DEFAULT_CAPACITY: usize = 5_000;

#[derive(Debug, Clone)]
pub struct ConflictingPair {
    pub source: String,
    pub first: Uuid,
    pub second: Uuid,
}

pub struct ContextManager {
    capacity: usize,
    entries: RwLock<HashMap<Uuid, ContextEntry>>,
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ContextManager {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: RwLock::new(HashMap::new()) }
    }

    /// Inserts `entry`, evicting the least valuable existing entry first if
    /// the store is already at capacity.
    pub fn add_entry(&self, entry: ContextEntry) -> Uuid {
        let id = entry.id;
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            if let Some(victim) = least_valuable(&entries) {
                debug!(evicted = %victim, "context store at capacity, evicting");
                entries.remove(&victim);
            }
        }
        entries.insert(id, entry);
        id
    }

    /// Returns the entry's decompressed content, transparent to the caller.
    pub fn get_entry(&self, id: Uuid) -> Option<ContextEntry> {
        self.entries.read().get(&id).cloned()
    }

    pub fn remove_entry(&self, id: Uuid) -> bool {
        self.entries.write().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries relevant to `kind`, ranked by
    /// `type_match·0.5 + priority/10·0.3 + recency·0.2` (higher first),
    /// returned up to the point the cumulative stored byte size would
    /// exceed `budget_bytes`.
    pub fn build_context(&self, kind: &str, budget_bytes: usize) -> Vec<ContextEntry> {
        let entries = self.entries.read();
        let mut scored: Vec<(f64, &ContextEntry)> = entries.values().map(|e| (relevance_score(e, kind), e)).collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut out = Vec::new();
        let mut used = 0usize;
        for (_, entry) in scored {
            let size = entry.stored_len();
            if used + size > budget_bytes && !out.is_empty() {
                break;
            }
            out.push(entry.clone());
            used += size;
            if used >= budget_bytes {
                break;
            }
        }
        out
    }

    /// Entries that share `(source, normalized content)` but disagree on
    /// metadata — the same fact recorded twice with drifted annotations.
    pub fn detect_conflicts(&self) -> Vec<ConflictingPair> {
        let entries = self.entries.read();
        let mut by_key: HashMap<(String, String), Vec<&ContextEntry>> = HashMap::new();
        for entry in entries.values() {
            by_key.entry((entry.source.clone(), entry.normalized_content())).or_default().push(entry);
        }

        let mut conflicts = Vec::new();
        for ((source, _), group) in by_key {
            if group.len() < 2 {
                continue;
            }
            for i in 0..group.len() {
                for j in (i + 1)..group.len() {
                    if group[i].metadata != group[j].metadata {
                        conflicts.push(ConflictingPair { source: source.clone(), first: group[i].id, second: group[j].id });
                    }
                }
            }
        }
        conflicts
    }
}

fn recency_score(entry: &ContextEntry) -> f64 {
    let age_secs = (Utc::now() - entry.timestamp).num_seconds().max(0) as f64;
    (1.0 / (1.0 + age_secs / 3600.0)).clamp(0.0, 1.0)
}

fn relevance_score(entry: &ContextEntry, kind: &str) -> f64 {
    let type_match = if entry.kind == kind { 1.0 } else { 0.0 };
    let priority_norm = (entry.priority as f64 / 10.0).clamp(0.0, 1.0);
    type_match * 0.5 + priority_norm * 0.3 + recency_score(entry) * 0.2
}

fn eviction_score(entry: &ContextEntry) -> f64 {
    entry.priority as f64 * 0.7 + recency_score(entry) * 0.3
}

fn least_valuable(entries: &HashMap<Uuid, ContextEntry>) -> Option<Uuid> {
    entries
        .values()
        .min_by(|a, b| eviction_score(a).partial_cmp(&eviction_score(b)).unwrap_or(std::cmp::Ordering::Equal))
        .map(|e| e.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    #[test]
    fn build_context_prefers_matching_kind_and_higher_priority() {
        let mgr = ContextManager::default();
        mgr.add_entry(ContextEntry::new("note", "src", "a", StdHashMap::new(), 9));
        mgr.add_entry(ContextEntry::new("fact", "src", "b", StdHashMap::new(), 1));
        let result = mgr.build_context("note", 1024);
        assert_eq!(result[0].kind, "note");
    }

    #[test]
    fn build_context_respects_byte_budget() {
        let mgr = ContextManager::default();
        for i in 0..5 {
            mgr.add_entry(ContextEntry::new("note", "src", &format!("entry-{i}-filler-text"), StdHashMap::new(), 5));
        }
        let result = mgr.build_context("note", 20);
        assert_eq!(result.len(), 1, "budget of 20 bytes only fits one ~20 byte entry");
    }

    #[test]
    fn eviction_drops_the_least_valuable_entry_at_capacity() {
        let mgr = ContextManager::new(2);
        let low = mgr.add_entry(ContextEntry::new("note", "src", "low priority", StdHashMap::new(), 0));
        mgr.add_entry(ContextEntry::new("note", "src", "high priority a", StdHashMap::new(), 9));
        mgr.add_entry(ContextEntry::new("note", "src", "high priority b", StdHashMap::new(), 9));
        assert_eq!(mgr.len(), 2);
        assert!(mgr.get_entry(low).is_none(), "lowest-priority entry should have been evicted");
    }

    #[test]
    fn detect_conflicts_finds_same_content_with_differing_metadata() {
        let mgr = ContextManager::default();
        let mut meta_a = StdHashMap::new();
        meta_a.insert("confidence".to_string(), "high".to_string());
        let mut meta_b = StdHashMap::new();
        meta_b.insert("confidence".to_string(), "low".to_string());
        mgr.add_entry(ContextEntry::new("fact", "src", "the sky is blue", meta_a, 5));
        mgr.add_entry(ContextEntry::new("fact", "src", "The Sky Is Blue", meta_b, 5));
        let conflicts = mgr.detect_conflicts();
        assert_eq!(conflicts.len(), 1);
    }

    #[test]
    fn identical_entries_with_matching_metadata_are_not_conflicts() {
        let mgr = ContextManager::default();
        mgr.add_entry(ContextEntry::new("fact", "src", "the sky is blue", StdHashMap::new(), 5));
        mgr.add_entry(ContextEntry::new("fact", "src", "the sky is blue", StdHashMap::new(), 5));
        assert!(mgr.detect_conflicts().is_empty());
    }
}
