//! Memory capture and recall support for Apployd.

pub mod capture;
pub mod consistency;
pub mod context;
pub mod error;
pub mod extractor;
pub mod keywords;
pub mod model;
pub mod policy;
pub mod provider;
pub mod recall;
pub mod rolling;
pub mod store;

/// Write-side pipeline over a store.
pub use capture::{CaptureReport, MemoryCapture};
/// Opinion and fact logs.
pub use consistency::{ConsistencyTracker, ConsistencyUpdate, stated_facts, stated_opinions};
/// Topic, sentiment, complexity, and code-intent tracking.
pub use context::{
    Complexity, ContextObservation, ContextTracker, Sentiment, estimate_complexity,
    previous_topics,
};
/// Memory error type.
pub use error::MemoryError;
/// Rule-table fact extraction.
pub use extractor::{Extraction, FactExtractor, RuleGroup};
pub use keywords::extract_keywords;
/// Memory and conversation records.
pub use model::{
    ChatMessage, ConversationContext, ConversationId, ConversationRecord, Importance, MemoryId,
    MemoryLabel, MemoryMetadata, MemoryRecord, MemoryType, Sender, StoreSnapshot, context_keys,
};
/// Capture policy.
pub use policy::CapturePolicy;
/// Store persistence backends.
pub use provider::{FileStoreProvider, InMemoryStoreProvider, StoreProvider};
/// Relevance scoring.
pub use recall::{DEFAULT_RECALL_LIMIT, RecallOptions, ScoredMemory, rank_memories, score_memory};
/// The memory store.
pub use store::{DEFAULT_HISTORY_LIMIT, MemoryStore};
