//! Test helpers shared across Apployd crates.

pub mod llm;
pub mod memory;

pub use llm::{FailingCompletion, FixedCompletion, RecordingCompletion, StreamingCompletion};
pub use memory::{FailingStore, memory_fixture, seeded_store};
