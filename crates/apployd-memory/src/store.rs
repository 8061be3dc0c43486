//! The explicit memory store: memories, conversations, and their persistence.

use crate::error::MemoryError;
use crate::keywords::extract_keywords;
use crate::model::{
    ChatMessage, ConversationContext, ConversationId, ConversationRecord,
    DEFAULT_CONVERSATION_TITLE, MemoryId, MemoryLabel, MemoryMetadata, MemoryRecord, MemoryType,
    Sender, StoreSnapshot,
};
use crate::provider::{FileStoreProvider, InMemoryStoreProvider, StoreProvider};
use crate::recall::{RecallOptions, ScoredMemory, rank_memories};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;

/// Number of messages returned by [`MemoryStore::conversation_history`] by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Titles derived from the first user message are cut to this many characters.
const TITLE_MAX_CHARS: usize = 30;

fn derive_title(text: &str) -> String {
    if text.chars().count() > TITLE_MAX_CHARS {
        let head: String = text.chars().take(TITLE_MAX_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Insert a fresh conversation and make it current.
fn start_conversation(snapshot: &mut StoreSnapshot) -> ConversationId {
    let conversation = ConversationRecord::new();
    let id = conversation.id;
    snapshot.conversations.insert(id, conversation);
    snapshot.current_conversation_id = Some(id);
    id
}

fn conversation_mut(
    snapshot: &mut StoreSnapshot,
    id: ConversationId,
) -> Result<&mut ConversationRecord, MemoryError> {
    snapshot
        .conversations
        .get_mut(&id)
        .ok_or(MemoryError::UnknownConversation(id))
}

/// Memory records plus conversation records, saved as one blob on every mutation.
///
/// Exactly one conversation is current at any time. Operations take the target
/// conversation explicitly; the current id is only a persisted default for
/// callers that resume a session.
pub struct MemoryStore {
    snapshot: StoreSnapshot,
    current: ConversationId,
    provider: Arc<dyn StoreProvider>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("revision", &self.snapshot.revision)
            .field("memories", &self.snapshot.memories.len())
            .field("conversations", &self.snapshot.conversations.len())
            .field("current", &self.current)
            .finish()
    }
}

impl MemoryStore {
    /// Load the store from `provider`.
    ///
    /// A blob that fails to decode is logged, cleared, and replaced by an empty
    /// store. A conversation is created when none is current.
    pub fn open(provider: Arc<dyn StoreProvider>) -> Result<Self, MemoryError> {
        let snapshot = match provider.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => StoreSnapshot::default(),
            Err(MemoryError::Serde(err)) => {
                warn!("discarding unreadable memory store (error={err})");
                provider.clear()?;
                StoreSnapshot::default()
            }
            Err(err) => return Err(err),
        };
        Self::from_snapshot(snapshot, provider)
    }

    /// Open a store backed by a JSON file.
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        Self::open(Arc::new(FileStoreProvider::new(path)?))
    }

    /// Open an isolated store that never touches disk.
    pub fn in_memory() -> Result<Self, MemoryError> {
        Self::open(Arc::new(InMemoryStoreProvider::new()))
    }

    fn from_snapshot(
        snapshot: StoreSnapshot,
        provider: Arc<dyn StoreProvider>,
    ) -> Result<Self, MemoryError> {
        let existing = snapshot
            .current_conversation_id
            .filter(|id| snapshot.conversations.contains_key(id));
        let mut store = Self {
            current: existing.unwrap_or_default(),
            snapshot,
            provider,
        };
        if existing.is_none() {
            store.create_conversation()?;
        }
        info!(
            "memory store opened (revision={}, memories={}, conversations={})",
            store.snapshot.revision,
            store.snapshot.memories.len(),
            store.snapshot.conversations.len()
        );
        Ok(store)
    }

    /// Re-read the blob, discarding unsaved local state.
    pub fn reload(&mut self) -> Result<(), MemoryError> {
        let snapshot = self.provider.load()?.unwrap_or_default();
        let provider = Arc::clone(&self.provider);
        *self = Self::from_snapshot(snapshot, provider)?;
        Ok(())
    }

    /// Drop every memory and conversation and start a fresh current conversation.
    pub fn reset(&mut self) -> Result<ConversationId, MemoryError> {
        let id = self.commit(|snapshot| {
            snapshot.memories.clear();
            snapshot.conversations.clear();
            Ok(start_conversation(snapshot))
        })?;
        info!(
            "memory store reset (revision={}, conversation_id={id})",
            self.snapshot.revision
        );
        Ok(id)
    }

    pub fn snapshot(&self) -> &StoreSnapshot {
        &self.snapshot
    }

    pub fn revision(&self) -> u64 {
        self.snapshot.revision
    }

    /// Apply `change` to a copy of the snapshot and save it.
    ///
    /// The copy replaces the live snapshot only after the provider accepted it,
    /// so a failed save leaves the store exactly as it was.
    fn commit<R>(
        &mut self,
        change: impl FnOnce(&mut StoreSnapshot) -> Result<R, MemoryError>,
    ) -> Result<R, MemoryError> {
        let mut next = self.snapshot.clone();
        let result = change(&mut next)?;
        let expected = self.snapshot.revision;
        next.revision = expected + 1;
        self.provider.save(&next, expected)?;
        if let Some(current) = next.current_conversation_id {
            self.current = current;
        }
        self.snapshot = next;
        Ok(result)
    }

    // --- conversations ---

    /// Create a conversation and make it current.
    pub fn create_conversation(&mut self) -> Result<ConversationId, MemoryError> {
        let id = self.commit(|snapshot| Ok(start_conversation(snapshot)))?;
        info!("conversation created (conversation_id={id})");
        Ok(id)
    }

    /// Make `id` current. Returns `false` when the id is unknown.
    pub fn switch_conversation(&mut self, id: ConversationId) -> Result<bool, MemoryError> {
        if !self.snapshot.conversations.contains_key(&id) {
            return Ok(false);
        }
        self.commit(|snapshot| {
            snapshot.current_conversation_id = Some(id);
            Ok(())
        })?;
        debug!("conversation switched (conversation_id={id})");
        Ok(true)
    }

    pub fn current_conversation_id(&self) -> ConversationId {
        self.current
    }

    pub fn conversation(&self, id: ConversationId) -> Option<&ConversationRecord> {
        self.snapshot.conversations.get(&id)
    }

    /// All conversations, most recently updated first.
    pub fn conversations(&self) -> Vec<&ConversationRecord> {
        let mut conversations: Vec<_> = self.snapshot.conversations.values().collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        conversations
    }

    pub fn rename_conversation(
        &mut self,
        id: ConversationId,
        title: impl Into<String>,
    ) -> Result<(), MemoryError> {
        let title = title.into();
        self.commit(|snapshot| {
            let conversation = conversation_mut(snapshot, id)?;
            conversation.title = title;
            conversation.updated_at = Utc::now();
            Ok(())
        })
    }

    pub fn update_summary(
        &mut self,
        id: ConversationId,
        summary: impl Into<String>,
    ) -> Result<(), MemoryError> {
        let summary = summary.into();
        self.commit(|snapshot| {
            let conversation = conversation_mut(snapshot, id)?;
            conversation.summary = summary;
            conversation.updated_at = Utc::now();
            Ok(())
        })
    }

    /// Append a message. The first user message titles an untitled conversation.
    pub fn add_message(
        &mut self,
        id: ConversationId,
        message: ChatMessage,
    ) -> Result<(), MemoryError> {
        let count = self.commit(|snapshot| {
            let conversation = conversation_mut(snapshot, id)?;
            let first_user_message = message.sender == Sender::User
                && conversation.title == DEFAULT_CONVERSATION_TITLE
                && !conversation
                    .messages
                    .iter()
                    .any(|existing| existing.sender == Sender::User);
            if first_user_message {
                conversation.title = derive_title(&message.text);
            }
            conversation.messages.push(message);
            conversation.updated_at = Utc::now();
            Ok(conversation.messages.len())
        })?;
        debug!("message added (conversation_id={id}, messages={count})");
        Ok(())
    }

    /// The last `limit` messages, oldest first.
    pub fn conversation_history(
        &self,
        id: ConversationId,
        limit: usize,
    ) -> Result<&[ChatMessage], MemoryError> {
        let conversation = self
            .conversation(id)
            .ok_or(MemoryError::UnknownConversation(id))?;
        let start = conversation.messages.len().saturating_sub(limit);
        Ok(&conversation.messages[start..])
    }

    // --- context ---

    /// Mutate a conversation's context and save once.
    pub fn update_context<R>(
        &mut self,
        id: ConversationId,
        update: impl FnOnce(&mut ConversationContext) -> R,
    ) -> Result<R, MemoryError> {
        self.commit(|snapshot| {
            let conversation = conversation_mut(snapshot, id)?;
            let result = update(&mut conversation.context);
            conversation.updated_at = Utc::now();
            Ok(result)
        })
    }

    pub fn set_context(
        &mut self,
        id: ConversationId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), MemoryError> {
        let (key, value) = (key.into(), value.into());
        self.update_context(id, |context| {
            context.insert(key, value);
        })
    }

    pub fn context_value(&self, id: ConversationId, key: &str) -> Option<&str> {
        self.conversation(id)
            .and_then(|conversation| conversation.context.get(key))
            .map(String::as_str)
    }

    pub fn context(&self, id: ConversationId) -> Option<&ConversationContext> {
        self.conversation(id).map(|conversation| &conversation.context)
    }

    // --- memories ---

    /// Store a new memory. Keywords are derived from `text` when none are given.
    pub fn add_memory(
        &mut self,
        conversation: Option<ConversationId>,
        text: impl Into<String>,
        memory_type: MemoryType,
        mut metadata: MemoryMetadata,
    ) -> Result<MemoryId, MemoryError> {
        let text = text.into();
        if metadata.keywords.is_empty() {
            metadata.keywords = extract_keywords(&text);
        }
        let record = MemoryRecord::new(text, memory_type, metadata, conversation);
        let id = record.id;
        debug!(
            "memory added (memory_id={id}, type={}, label={})",
            memory_type.as_str(),
            record.metadata.label.map_or("none", |label| label.as_str())
        );
        self.commit(|snapshot| {
            snapshot.memories.push(record);
            Ok(())
        })?;
        Ok(id)
    }

    pub fn memory(&self, id: MemoryId) -> Option<&MemoryRecord> {
        self.snapshot.memories.iter().find(|memory| memory.id == id)
    }

    /// All memories, newest first.
    pub fn memories(&self) -> Vec<&MemoryRecord> {
        let mut memories: Vec<_> = self.snapshot.memories.iter().collect();
        memories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        memories
    }

    pub fn memories_by_type(&self, memory_type: MemoryType) -> Vec<&MemoryRecord> {
        self.snapshot
            .memories
            .iter()
            .filter(|memory| memory.memory_type == memory_type)
            .collect()
    }

    pub fn memories_with_label(&self, label: MemoryLabel) -> Vec<&MemoryRecord> {
        self.snapshot
            .memories
            .iter()
            .filter(|memory| memory.metadata.label == Some(label))
            .collect()
    }

    /// Case-insensitive substring search over memory text and keywords.
    pub fn search_memories(&self, query: &str) -> Vec<&MemoryRecord> {
        let query = query.to_lowercase();
        self.snapshot
            .memories
            .iter()
            .filter(|memory| {
                memory.text.to_lowercase().contains(&query)
                    || memory
                        .metadata
                        .keywords
                        .iter()
                        .any(|keyword| keyword.to_lowercase().contains(&query))
            })
            .collect()
    }

    /// Rank memories against `query` as of now.
    pub fn relevant_memories(&self, query: &str, options: RecallOptions) -> Vec<&MemoryRecord> {
        self.relevant_memories_at(query, options, Utc::now())
            .into_iter()
            .map(|scored| scored.memory)
            .collect()
    }

    /// Rank memories against `query` with an explicit clock.
    pub fn relevant_memories_at(
        &self,
        query: &str,
        options: RecallOptions,
        now: DateTime<Utc>,
    ) -> Vec<ScoredMemory<'_>> {
        rank_memories(query, &self.snapshot.memories, options, now)
    }

    /// Record that a memory contributed to a prompt.
    pub fn access_memory(&mut self, id: MemoryId) -> Result<bool, MemoryError> {
        Ok(self.access_memories(&[id])? == 1)
    }

    /// Bump access bookkeeping for every listed memory and save once.
    pub fn access_memories(&mut self, ids: &[MemoryId]) -> Result<usize, MemoryError> {
        let touched = self
            .snapshot
            .memories
            .iter()
            .filter(|memory| ids.contains(&memory.id))
            .count();
        if touched == 0 {
            return Ok(0);
        }
        let now = Utc::now();
        self.commit(|snapshot| {
            for memory in snapshot
                .memories
                .iter_mut()
                .filter(|memory| ids.contains(&memory.id))
            {
                memory.access_count = memory.access_count.saturating_add(1);
                memory.last_accessed = now;
            }
            Ok(())
        })?;
        Ok(touched)
    }

    /// Delete a memory. Returns `false` when it did not exist.
    pub fn delete_memory(&mut self, id: MemoryId) -> Result<bool, MemoryError> {
        if self.memory(id).is_none() {
            return Ok(false);
        }
        self.commit(|snapshot| {
            snapshot.memories.retain(|memory| memory.id != id);
            Ok(())
        })?;
        info!("memory deleted (memory_id={id})");
        Ok(true)
    }
}
