//! Slash commands accepted by the interactive chat loop.

use apployd_memory::{ConversationId, MemoryId};
use uuid::Uuid;

/// Command typed at the chat prompt instead of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    New,
    Switch(ConversationId),
    Conversations,
    /// List memories, optionally filtered by a search query.
    Memories(Option<String>),
    Forget(MemoryId),
    Reset,
    Help,
    Quit,
}

/// Usage lines printed by `/help`.
pub const SLASH_HELP: &str = "\
/new                 start a new conversation
/switch <id>         switch to a conversation
/conversations       list conversations
/memories [query]    list or search memories
/forget <id>         delete a memory
/reset               clear all memories and conversations
/quit                leave the chat";

/// Parse `input` as a slash command.
///
/// Returns `Ok(None)` for ordinary messages.
pub fn parse_slash_command(input: &str) -> Result<Option<SlashCommand>, String> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return Ok(None);
    }
    let mut parts = trimmed.trim_start_matches('/').split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(None);
    };
    match command.to_lowercase().as_str() {
        "new" => Ok(Some(SlashCommand::New)),
        "conversations" | "list" => Ok(Some(SlashCommand::Conversations)),
        "switch" => {
            let Some(id) = parts.next() else {
                return Err("usage: /switch <conversation_id>".to_string());
            };
            let id = Uuid::parse_str(id).map_err(|_| "invalid conversation id".to_string())?;
            Ok(Some(SlashCommand::Switch(id)))
        }
        "memories" => {
            let query = parts.collect::<Vec<_>>().join(" ");
            Ok(Some(SlashCommand::Memories(
                (!query.is_empty()).then_some(query),
            )))
        }
        "forget" => {
            let Some(id) = parts.next() else {
                return Err("usage: /forget <memory_id>".to_string());
            };
            let id = Uuid::parse_str(id).map_err(|_| "invalid memory id".to_string())?;
            Ok(Some(SlashCommand::Forget(id)))
        }
        "reset" => Ok(Some(SlashCommand::Reset)),
        "help" | "?" => Ok(Some(SlashCommand::Help)),
        "quit" | "exit" => Ok(Some(SlashCommand::Quit)),
        other => Err(format!("unknown command: /{other}")),
    }
}
