//! Keyword-overlap relevance scoring for memory recall.

use crate::keywords::extract_keywords;
use crate::model::{Importance, MemoryRecord, MemoryType};
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;

/// Number of memories returned when no limit is given.
pub const DEFAULT_RECALL_LIMIT: usize = 5;

/// Recall options for memory retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecallOptions {
    /// Maximum number of memories to return.
    pub limit: usize,
    /// Only score memories of this type.
    pub memory_type: Option<MemoryType>,
}

impl Default for RecallOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RECALL_LIMIT,
            memory_type: None,
        }
    }
}

impl RecallOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn of_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = Some(memory_type);
        self
    }
}

/// A memory paired with its relevance score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredMemory<'a> {
    pub memory: &'a MemoryRecord,
    pub score: f64,
}

fn importance_multiplier(importance: Option<Importance>) -> f64 {
    match importance {
        Some(Importance::High) => 1.5,
        Some(Importance::Medium) => 1.2,
        Some(Importance::Low) | None => 1.0,
    }
}

fn access_multiplier(access_count: u32) -> f64 {
    if access_count > 3 {
        1.3
    } else if access_count > 0 {
        1.1
    } else {
        1.0
    }
}

fn recency_multiplier(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    if now - created_at < Duration::days(1) {
        1.2
    } else {
        1.0
    }
}

/// Score one memory against pre-extracted query keywords.
///
/// A query keyword matches when it contains, or is contained in, any memory
/// keyword. The match ratio is then scaled by importance, access count, and
/// age relative to `now`.
pub fn score_memory(query_keywords: &[String], memory: &MemoryRecord, now: DateTime<Utc>) -> f64 {
    if query_keywords.is_empty() {
        return 0.0;
    }
    let derived;
    let memory_keywords: &[String] = if memory.metadata.keywords.is_empty() {
        derived = extract_keywords(&memory.text);
        &derived
    } else {
        &memory.metadata.keywords
    };
    let matching = query_keywords
        .iter()
        .filter(|keyword| {
            memory_keywords
                .iter()
                .any(|mk| mk.contains(keyword.as_str()) || keyword.contains(mk.as_str()))
        })
        .count();
    if matching == 0 {
        return 0.0;
    }
    matching as f64 / query_keywords.len() as f64
        * importance_multiplier(memory.metadata.importance)
        * access_multiplier(memory.access_count)
        * recency_multiplier(memory.created_at, now)
}

/// Rank `memories` against `query`, highest score first.
///
/// Zero scores are dropped. Equal scores keep store order.
pub fn rank_memories<'a>(
    query: &str,
    memories: &'a [MemoryRecord],
    options: RecallOptions,
    now: DateTime<Utc>,
) -> Vec<ScoredMemory<'a>> {
    let query_keywords = extract_keywords(query);
    if query_keywords.is_empty() || options.limit == 0 {
        return Vec::new();
    }
    let mut scored: Vec<ScoredMemory<'a>> = memories
        .iter()
        .filter(|memory| {
            options
                .memory_type
                .is_none_or(|memory_type| memory.memory_type == memory_type)
        })
        .map(|memory| ScoredMemory {
            memory,
            score: score_memory(&query_keywords, memory, now),
        })
        .filter(|scored| scored.score > 0.0)
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(options.limit);
    scored
}
