//! Scored context entries with priority/recency eviction and
//! compression-on-write for large content.

pub mod entry;
pub mod manager;

pub use entry::{ContextEntry, DEFAULT_COMPRESSION_THRESHOLD};
pub use manager::{ConflictingPair, ContextManager, DEFAULT_CAPACITY};
