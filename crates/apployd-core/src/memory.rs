//! Memory and completion config mapping.

use crate::error::ApploydCoreError;
use apployd_config::{CaptureConfig, CompletionConfig, MemoryConfig};
use apployd_memory::{CapturePolicy, ChatMessage, MemoryStore, Sender};
use apployd_protocol::{GenerationConfig, Turn};
use log::debug;
use std::path::{Path, PathBuf};

/// Translate capture toggles from config into runtime policy.
pub(crate) fn capture_policy_from_config(config: &CaptureConfig) -> CapturePolicy {
    CapturePolicy {
        extract_facts: config.extract_facts,
        track_context: config.track_context,
        track_consistency: config.track_consistency,
    }
}

/// Translate decoding parameters from config into wire parameters.
pub(crate) fn generation_from_config(config: &CompletionConfig) -> GenerationConfig {
    GenerationConfig {
        temperature: config.temperature,
        top_p: config.top_p,
        top_k: config.top_k,
        max_output_tokens: config.max_output_tokens,
    }
}

/// Store file for `config`; relative paths resolve against `cwd`.
pub fn resolve_store_path(config: &MemoryConfig, cwd: &Path) -> PathBuf {
    if config.path.is_absolute() {
        config.path.clone()
    } else {
        cwd.join(&config.path)
    }
}

/// Open the file-backed store configured in `config`.
pub fn open_store(config: &MemoryConfig, cwd: &Path) -> Result<MemoryStore, ApploydCoreError> {
    let path = resolve_store_path(config, cwd);
    debug!("opening memory store (path={})", path.display());
    Ok(MemoryStore::open_file(path)?)
}

/// Convert stored messages into completion turns.
///
/// Leading assistant messages are skipped so the turns start with the user.
pub fn history_turns(messages: &[ChatMessage]) -> Vec<Turn> {
    messages
        .iter()
        .skip_while(|message| message.sender == Sender::Assistant)
        .map(|message| match message.sender {
            Sender::User => Turn::user(message.text.clone()),
            Sender::Assistant => Turn::model(message.text.clone()),
        })
        .collect()
}
