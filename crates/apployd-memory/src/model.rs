//! Memory and conversation records persisted by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for a memory record.
pub type MemoryId = Uuid;
/// Unique identifier for a conversation.
pub type ConversationId = Uuid;
/// Per-conversation key/value context.
pub type ConversationContext = BTreeMap<String, String>;

/// Current on-disk schema version for [`StoreSnapshot`].
pub const CURRENT_SCHEMA_VERSION: u32 = 1;
/// Title given to conversations before the first user message arrives.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

/// Context keys written by the trackers and read by prompt assembly.
pub mod context_keys {
    pub const USER_NAME: &str = "userName";
    pub const CURRENT_TOPIC: &str = "currentTopic";
    pub const PREVIOUS_TOPICS: &str = "previousTopics";
    pub const USER_SENTIMENT: &str = "userSentiment";
    pub const CONVERSATION_COMPLEXITY: &str = "conversationComplexity";
    pub const USER_WANTS_CODE: &str = "userWantsCode";
    pub const STATED_OPINIONS: &str = "statedOpinions";
    pub const STATED_FACTS: &str = "statedFacts";
}

/// Kind of memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Regular conversation history.
    Conversation,
    /// Fact learned from the user.
    LearnedFact,
    /// User preference.
    UserPreference,
    /// Contextual information.
    Context,
    /// Identity information the user disclosed.
    Important,
}

impl MemoryType {
    /// All memory types, in declaration order.
    pub const ALL: [MemoryType; 5] = [
        MemoryType::Conversation,
        MemoryType::LearnedFact,
        MemoryType::UserPreference,
        MemoryType::Context,
        MemoryType::Important,
    ];

    /// Return the type as its snake_case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Conversation => "conversation",
            MemoryType::LearnedFact => "learned_fact",
            MemoryType::UserPreference => "user_preference",
            MemoryType::Context => "context",
            MemoryType::Important => "important",
        }
    }

    /// Parse a type from its wire name.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|memory_type| memory_type.as_str() == value)
    }
}

/// Static importance tag attached at extraction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    Medium,
    Low,
}

/// Semantic label naming what an extracted value represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryLabel {
    Name,
    Age,
    Birthday,
    Location,
    Occupation,
    Email,
    Phone,
    Likes,
    Dislikes,
    Favorite,
    Allergy,
    Explicit,
}

impl MemoryLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryLabel::Name => "name",
            MemoryLabel::Age => "age",
            MemoryLabel::Birthday => "birthday",
            MemoryLabel::Location => "location",
            MemoryLabel::Occupation => "occupation",
            MemoryLabel::Email => "email",
            MemoryLabel::Phone => "phone",
            MemoryLabel::Likes => "likes",
            MemoryLabel::Dislikes => "dislikes",
            MemoryLabel::Favorite => "favorite",
            MemoryLabel::Allergy => "allergy",
            MemoryLabel::Explicit => "explicit",
        }
    }
}

/// Extraction metadata stored alongside a memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryMetadata {
    /// Keywords extracted from the memory text.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Pattern that produced the memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<Importance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<MemoryLabel>,
    /// Parsed value, e.g. the name itself for a `name` label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// What a `favorite` refers to ("color" in "my favorite color is blue").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Full utterance the memory was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_from: Option<String>,
}

/// Persisted memory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    /// Record identifier.
    pub id: MemoryId,
    /// Captured text.
    pub text: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Number of prompts this record contributed to.
    pub access_count: u32,
    #[serde(default)]
    pub metadata: MemoryMetadata,
    /// Conversation active when the memory was captured (lookup only).
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
}

impl MemoryRecord {
    /// Build a fresh record with zero accesses.
    pub fn new(
        text: impl Into<String>,
        memory_type: MemoryType,
        metadata: MemoryMetadata,
        conversation_id: Option<ConversationId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            memory_type,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            metadata,
            conversation_id,
        }
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    #[serde(alias = "apployd", alias = "gemini")]
    Assistant,
}

/// Single message in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// User message stamped with the current time.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            timestamp: Utc::now(),
        }
    }

    /// Assistant message stamped with the current time.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Assistant,
            timestamp: Utc::now(),
        }
    }
}

/// Conversation transcript plus tracked context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: ConversationId,
    /// Append-only message list.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub title: String,
    #[serde(default)]
    pub context: ConversationContext,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub summary: String,
}

impl ConversationRecord {
    /// Create an empty conversation with the default title.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
            title: DEFAULT_CONVERSATION_TITLE.to_string(),
            context: ConversationContext::new(),
            created_at: now,
            updated_at: now,
            summary: String::new(),
        }
    }
}

impl Default for ConversationRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Whole-store blob written on every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default = "default_schema_version")]
    pub version: u32,
    /// Incremented on every save; used to detect concurrent writers.
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub memories: Vec<MemoryRecord>,
    #[serde(default)]
    pub conversations: BTreeMap<ConversationId, ConversationRecord>,
    #[serde(default)]
    pub current_conversation_id: Option<ConversationId>,
}

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            version: CURRENT_SCHEMA_VERSION,
            revision: 0,
            memories: Vec::new(),
            conversations: BTreeMap::new(),
            current_conversation_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn memory_type_round_trips_wire_names() {
        for memory_type in MemoryType::ALL {
            assert_eq!(MemoryType::parse(memory_type.as_str()), Some(memory_type));
        }
        assert_eq!(MemoryType::parse("bogus"), None);
    }

    #[test]
    fn record_serializes_type_field() {
        let record = MemoryRecord::new("I like tea", MemoryType::UserPreference, MemoryMetadata::default(), None);
        let value = serde_json::to_value(&record).expect("json");
        assert_eq!(value["type"], json!("user_preference"));
        assert_eq!(value["accessCount"], json!(0));
    }

    #[test]
    fn legacy_assistant_sender_is_accepted() {
        let message: ChatMessage = serde_json::from_value(json!({
            "text": "hello",
            "sender": "apployd",
            "timestamp": "2025-01-01T00:00:00Z"
        }))
        .expect("message");
        assert_eq!(message.sender, Sender::Assistant);
    }

    #[test]
    fn snapshot_without_version_defaults_to_current() {
        let snapshot: StoreSnapshot = serde_json::from_value(json!({})).expect("snapshot");
        assert_eq!(snapshot.version, CURRENT_SCHEMA_VERSION);
        assert_eq!(snapshot.revision, 0);
    }
}
