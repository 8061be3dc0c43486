//! Wire types shared between the chat engine and completion services.
//!
//! The completion service is a black box: the engine hands it a
//! [`CompletionRequest`] and receives plain text back, possibly containing
//! `<immersive>` document blocks.

mod completion;
mod error;
mod immersive;
mod uncertainty;

pub use completion::{
    CompletionProvider, CompletionRequest, CompletionStream, GenerationConfig, HarmBlockThreshold,
    HarmCategory, SafetySetting, Turn, TurnRole, default_safety_settings,
};
pub use error::{CompletionError, PatternError};
pub use immersive::{ImmersiveBlock, ImmersiveParser, ResponseSegment};
pub use uncertainty::UncertaintyDetector;
