//! Error types for memory operations.

use crate::model::ConversationId;

/// Errors returned by the memory store, its providers, and rule tables.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(String),
    /// Conversation id is unknown to the store.
    #[error("unknown conversation: {0}")]
    UnknownConversation(ConversationId),
    /// Persisted blob was written by a newer schema.
    #[error("unsupported store schema version: {0}")]
    UnsupportedSchema(u32),
    /// Another writer saved the store since it was loaded.
    #[error("store revision conflict (expected {expected}, found {found})")]
    Conflict { expected: u64, found: u64 },
}

impl From<regex::Error> for MemoryError {
    fn from(err: regex::Error) -> Self {
        MemoryError::Regex(err.to_string())
    }
}
