//! Error types for the chat engine crate.

use apployd_config::ConfigError;
use apployd_memory::MemoryError;
use apployd_protocol::{CompletionError, PatternError};
use thiserror::Error;

/// Errors returned by prompt assembly and chat turns.
#[derive(Debug, Error)]
pub enum ApploydCoreError {
    /// Memory store or analyzer error.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
    /// Completion service error.
    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),
    /// Pattern table failed to compile.
    #[error("pattern error: {0}")]
    Pattern(#[from] PatternError),
    /// Config error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApploydCoreError {
    /// Message suitable for showing inline in a chat transcript.
    pub fn user_message(&self) -> String {
        match self {
            ApploydCoreError::Completion(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}
