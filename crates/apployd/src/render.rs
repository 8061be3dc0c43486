//! Plain-text rendering for terminal output.

use apployd_core::AssembledPrompt;
use apployd_memory::{ConversationRecord, MemoryRecord};
use apployd_protocol::ResponseSegment;

/// One line describing a memory: id, type and label, text, access count.
pub fn memory_line(memory: &MemoryRecord) -> String {
    let kind = match memory.metadata.label {
        Some(label) => format!("{}/{}", memory.memory_type.as_str(), label.as_str()),
        None => memory.memory_type.as_str().to_string(),
    };
    format!(
        "{}  [{kind}]  {}  (accessed {})",
        memory.id, memory.text, memory.access_count
    )
}

/// One line describing a conversation; the current one is starred.
pub fn conversation_line(conversation: &ConversationRecord, current: bool) -> String {
    format!(
        "{} {}  {}  ({} messages, updated {})",
        if current { "*" } else { " " },
        conversation.id,
        conversation.title,
        conversation.messages.len(),
        conversation.updated_at.format("%Y-%m-%d %H:%M")
    )
}

/// Reply text with immersive blocks set apart under a header line.
pub fn reply_text(segments: &[ResponseSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            ResponseSegment::Text(text) => out.push_str(text),
            ResponseSegment::Immersive(block) => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&format!(
                    "--- {} [{}] ({}) ---\n{}\n---\n",
                    block.title, block.kind, block.id, block.content
                ));
            }
        }
    }
    out
}

/// Assembled prompt followed by notes on anything the budget removed.
pub fn prompt_report(prompt: &AssembledPrompt, message: &str) -> String {
    let mut out = prompt.enhance(message);
    if !prompt.dropped.is_empty() {
        let dropped: Vec<_> = prompt.dropped.iter().map(|kind| kind.as_str()).collect();
        out.push_str(&format!("\n\n[dropped sections: {}]", dropped.join(", ")));
    }
    if prompt.over_budget {
        out.push_str("\n[user name alone exceeds the context budget]");
    }
    out
}
