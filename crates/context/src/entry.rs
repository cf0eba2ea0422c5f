//! `ContextEntry` storage representation: compressed transparently above a
//! size threshold, decompressed transparently on read.

use std::collections::HashMap;
use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use uuid::Uuid;

pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024;

#[derive(Debug, Clone)]
pub enum StoredContent {
    Plain(String),
    Compressed(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub id: Uuid,
    pub kind: String,
    pub source: String,
    content: StoredContent,
    pub metadata: HashMap<String, String>,
    pub priority: i32,
    pub timestamp: DateTime<Utc>,
}

impl ContextEntry {
    pub fn new(kind: impl Into<String>, source: impl Into<String>, content: &str, metadata: HashMap<String, String>, priority: i32) -> Self {
        Self::new_with_threshold(kind, source, content, metadata, priority, DEFAULT_COMPRESSION_THRESHOLD)
    }

    pub fn new_with_threshold(
        kind: impl Into<String>,
        source: impl Into<String>,
        content: &str,
        metadata: HashMap<String, String>,
        priority: i32,
        threshold: usize,
    ) -> Self {
        let stored = if content.len() > threshold { StoredContent::Compressed(compress(content)) } else { StoredContent::Plain(content.to_string()) };
        Self { id: Uuid::new_v4(), kind: kind.into(), source: source.into(), content: stored, metadata, priority, timestamp: Utc::now() }
    }

    /// Byte size as actually held in memory (compressed, where applicable).
    pub fn stored_len(&self) -> usize {
        match &self.content {
            StoredContent::Plain(s) => s.len(),
            StoredContent::Compressed(bytes) => bytes.len(),
        }
    }

    pub fn content(&self) -> String {
        match &self.content {
            StoredContent::Plain(s) => s.clone(),
            StoredContent::Compressed(bytes) => decompress(bytes),
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.content, StoredContent::Compressed(_))
    }

    /// Case-folded, whitespace-collapsed content, used to detect
    /// near-duplicate entries that differ only in formatting.
    pub fn normalized_content(&self) -> String {
        self.content().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

fn compress(content: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content.as_bytes()).expect("in-memory writer cannot fail");
    encoder.finish().expect("in-memory writer cannot fail")
}

fn decompress(bytes: &[u8]) -> String {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = String::new();
    decoder.read_to_string(&mut out).expect("entry was compressed by this crate");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_stored_plain() {
        let entry = ContextEntry::new("note", "test", "short", HashMap::new(), 5);
        assert!(!entry.is_compressed());
        assert_eq!(entry.content(), "short");
    }

    #[test]
    fn long_content_is_compressed_and_round_trips() {
        let long = "word ".repeat(400);
        let entry = ContextEntry::new("note", "test", &long, HashMap::new(), 5);
        assert!(entry.is_compressed());
        assert_eq!(entry.content(), long);
    }

    #[test]
    fn normalized_content_collapses_whitespace_and_case() {
        let a = ContextEntry::new("note", "test", "Hello   World", HashMap::new(), 1);
        let b = ContextEntry::new("note", "test", "hello world", HashMap::new(), 1);
        assert_eq!(a.normalized_content(), b.normalized_content());
    }
}
