//! Chat engine for Apployd.
//!
//! This crate owns prompt assembly, system instructions, the per-turn chat
//! flow over the memory store, and the Gemini completion provider used by the
//! CLI.

pub mod chat;
pub mod error;
pub mod gemini;
pub mod instructions;
pub mod memory;
pub mod prompt;

pub use chat::{ChatEngine, ChatReply};
pub use error::ApploydCoreError;
pub use gemini::GeminiProvider;
pub use instructions::{builtin_instructions, load_instructions, substitute_current_date};
pub use memory::{history_turns, open_store, resolve_store_path};
/// Prompt assembly primitives.
pub use prompt::{
    AssembledPrompt, DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_PERSONAL_RECALL_LIMIT, PersonalQuestion,
    PersonalQuestions, PromptAssembler, SectionKind,
};
