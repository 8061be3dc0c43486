//! Prompt assembly: instructions, recalled memories, and conversation context.

use crate::error::ApploydCoreError;
use crate::instructions::load_instructions;
use apployd_config::ApploydConfig;
use apployd_memory::{
    ConversationContext, ConversationId, DEFAULT_RECALL_LIMIT, MemoryError, MemoryId, MemoryLabel,
    MemoryRecord, MemoryStore, MemoryType, RecallOptions, context_keys, previous_topics,
    stated_facts, stated_opinions,
};
use chrono::NaiveDate;
use log::{debug, warn};
use regex::Regex;
use std::path::Path;

/// Per-type recall limit used for personal questions.
pub const DEFAULT_PERSONAL_RECALL_LIMIT: usize = 3;

/// Character budget for the memory context block.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 6000;

/// Context keys rendered by dedicated sections rather than the generic list.
const DEDICATED_KEYS: [&str; 6] = [
    context_keys::USER_NAME,
    context_keys::STATED_OPINIONS,
    context_keys::STATED_FACTS,
    context_keys::CURRENT_TOPIC,
    context_keys::PREVIOUS_TOPICS,
    context_keys::USER_SENTIMENT,
];

/// Questions about the user, with the label whose memories answer them.
const PERSONAL_QUESTIONS: [(&str, Option<MemoryLabel>); 9] = [
    (r"(?i)my name", Some(MemoryLabel::Name)),
    (r"(?i)my (birthday|birth date)", Some(MemoryLabel::Birthday)),
    (
        r"(?i)my (address|location|city|country)",
        Some(MemoryLabel::Location),
    ),
    (
        r"(?i)my (job|work|profession|occupation)",
        Some(MemoryLabel::Occupation),
    ),
    (r"(?i)my (hobby|hobbies|interests)", Some(MemoryLabel::Likes)),
    (r"(?i)my (email|phone|contact)", Some(MemoryLabel::Email)),
    (r"(?i)my (preference|favorite)", Some(MemoryLabel::Favorite)),
    (r"(?i)do i like", Some(MemoryLabel::Likes)),
    (r"(?i)what did i tell you about", None),
];

/// Outcome of matching a message against the personal question table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonalQuestion {
    /// Not a question about the user.
    No,
    /// A question about the user; the label of the first matching entry, if any.
    Yes(Option<MemoryLabel>),
}

/// Compiled personal question table.
#[derive(Debug, Clone)]
pub struct PersonalQuestions {
    table: Vec<(Regex, Option<MemoryLabel>)>,
}

impl PersonalQuestions {
    pub fn new() -> Result<Self, MemoryError> {
        let table = PERSONAL_QUESTIONS
            .iter()
            .map(|(pattern, label)| Regex::new(pattern).map(|regex| (regex, *label)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { table })
    }

    /// Classify `message`; the first matching entry decides the label.
    pub fn classify(&self, message: &str) -> PersonalQuestion {
        self.table
            .iter()
            .find(|(regex, _)| regex.is_match(message))
            .map_or(PersonalQuestion::No, |(_, label)| {
                PersonalQuestion::Yes(*label)
            })
    }
}

/// Kind of a rendered context section, in prompt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    UserName,
    Memories,
    Consistency,
    Topics,
    Sentiment,
    Additional,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::UserName => "user_name",
            SectionKind::Memories => "memories",
            SectionKind::Consistency => "consistency",
            SectionKind::Topics => "topics",
            SectionKind::Sentiment => "sentiment",
            SectionKind::Additional => "additional",
        }
    }
}

/// Sections removed first when the context block exceeds its budget.
/// The user name is never dropped.
const DROP_ORDER: [SectionKind; 5] = [
    SectionKind::Additional,
    SectionKind::Topics,
    SectionKind::Sentiment,
    SectionKind::Consistency,
    SectionKind::Memories,
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct ContextSection {
    kind: SectionKind,
    text: String,
}

/// An assembled prompt preamble and what went into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    /// Instructions followed by the memory context block, ready to prefix a message.
    pub preamble: String,
    /// Memory context block alone; empty when nothing was known.
    pub context: String,
    /// Memories included in the context, in prompt order.
    pub memories: Vec<MemoryId>,
    /// Sections removed to fit the budget.
    pub dropped: Vec<SectionKind>,
    /// Whether the context still exceeds the budget; only the user-name line is left then.
    pub over_budget: bool,
}

impl AssembledPrompt {
    /// Prefix `text` with the preamble.
    pub fn enhance(&self, text: &str) -> String {
        format!("{}{text}", self.preamble)
    }
}

/// Builds the text sent ahead of each user message.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    instructions: String,
    questions: PersonalQuestions,
    recall_limit: usize,
    personal_recall_limit: usize,
    max_context_chars: Option<usize>,
}

impl PromptAssembler {
    pub fn new(instructions: impl Into<String>) -> Result<Self, MemoryError> {
        Ok(Self {
            instructions: instructions.into(),
            questions: PersonalQuestions::new()?,
            recall_limit: DEFAULT_RECALL_LIMIT,
            personal_recall_limit: DEFAULT_PERSONAL_RECALL_LIMIT,
            max_context_chars: Some(DEFAULT_MAX_CONTEXT_CHARS),
        })
    }

    /// Assembler configured from `config`; a prompt file resolves against `cwd`.
    pub fn from_config(
        config: &ApploydConfig,
        cwd: &Path,
        today: NaiveDate,
    ) -> Result<Self, ApploydCoreError> {
        let instructions = load_instructions(&config.prompt, cwd, today)?;
        Ok(Self::new(instructions)?
            .with_recall_limits(
                config.memory.recall_limit,
                config.memory.personal_recall_limit,
            )
            .with_max_context_chars(config.prompt.max_context_chars))
    }

    /// Set the general and per-type personal recall limits.
    pub fn with_recall_limits(mut self, recall_limit: usize, personal_recall_limit: usize) -> Self {
        self.recall_limit = recall_limit;
        self.personal_recall_limit = personal_recall_limit;
        self
    }

    /// Set the context budget; `None` disables it.
    pub fn with_max_context_chars(mut self, max_context_chars: Option<usize>) -> Self {
        self.max_context_chars = max_context_chars;
        self
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Assemble the prompt for `message` and record access on every included memory.
    pub fn assemble(
        &self,
        store: &mut MemoryStore,
        conversation: ConversationId,
        message: &str,
    ) -> Result<AssembledPrompt, MemoryError> {
        let prompt = self.preview(store, conversation, message)?;
        store.access_memories(&prompt.memories)?;
        Ok(prompt)
    }

    /// Assemble the prompt for `message` without touching the store.
    pub fn preview(
        &self,
        store: &MemoryStore,
        conversation: ConversationId,
        message: &str,
    ) -> Result<AssembledPrompt, MemoryError> {
        let context = store
            .context(conversation)
            .ok_or(MemoryError::UnknownConversation(conversation))?;
        let memories = self.recall(store, message);

        let mut sections = Vec::new();
        if let Some(name) = context.get(context_keys::USER_NAME) {
            sections.push(ContextSection {
                kind: SectionKind::UserName,
                text: format!("The user's name is {name}.\n\n"),
            });
        }
        if !memories.is_empty() {
            let mut text = String::from("Here are some relevant things I know about the user:\n");
            for memory in &memories {
                text.push_str(&format!("- {}\n", memory.text));
            }
            text.push('\n');
            sections.push(ContextSection {
                kind: SectionKind::Memories,
                text,
            });
        }
        sections.extend(consistency_section(context));
        sections.extend(topics_section(context));
        if let Some(sentiment) = context.get(context_keys::USER_SENTIMENT) {
            sections.push(ContextSection {
                kind: SectionKind::Sentiment,
                text: format!("User's current sentiment appears to be: {sentiment}\n\n"),
            });
        }
        sections.extend(additional_section(context));

        let mut memory_ids: Vec<MemoryId> = memories.iter().map(|memory| memory.id).collect();
        let (context, dropped, over_budget) = self.fit_to_budget(sections);
        if dropped.contains(&SectionKind::Memories) {
            memory_ids.clear();
        }

        let preamble = if context.is_empty() {
            format!("{}\n\n", self.instructions)
        } else {
            format!("{}\n\nContext from memory:\n{context}\n\n", self.instructions)
        };
        debug!(
            "prompt assembled (conversation_id={conversation}, memories={}, context_chars={})",
            memory_ids.len(),
            context.chars().count()
        );
        Ok(AssembledPrompt {
            preamble,
            context,
            memories: memory_ids,
            dropped,
            over_budget,
        })
    }

    /// Relevant memories for `message`, cascading by type for personal questions.
    fn recall<'a>(&self, store: &'a MemoryStore, message: &str) -> Vec<&'a MemoryRecord> {
        let general = RecallOptions::default().with_limit(self.recall_limit);
        let PersonalQuestion::Yes(label) = self.questions.classify(message) else {
            return store.relevant_memories(message, general);
        };

        let personal = RecallOptions::default().with_limit(self.personal_recall_limit);
        let mut memories =
            store.relevant_memories(message, personal.of_type(MemoryType::Important));
        if memories.is_empty() {
            memories =
                store.relevant_memories(message, personal.of_type(MemoryType::UserPreference));
        }
        if memories.is_empty() {
            memories = store.relevant_memories(message, general);
        }
        if let Some(label) = label {
            for memory in store.memories_with_label(label) {
                if !memories.iter().any(|included| included.id == memory.id) {
                    memories.push(memory);
                }
            }
        }
        memories
    }

    /// Drop sections in [`DROP_ORDER`] until the block fits.
    ///
    /// The user-name line is never dropped or cut, even when it alone exceeds the budget.
    fn fit_to_budget(&self, mut sections: Vec<ContextSection>) -> (String, Vec<SectionKind>, bool) {
        let mut dropped = Vec::new();
        let Some(budget) = self.max_context_chars else {
            return (render(&sections), dropped, false);
        };

        let mut length: usize = sections.iter().map(|s| s.text.chars().count()).sum();
        for kind in DROP_ORDER {
            if length <= budget {
                break;
            }
            if let Some(idx) = sections.iter().position(|section| section.kind == kind) {
                let removed = sections.remove(idx);
                length -= removed.text.chars().count();
                warn!(
                    "dropped prompt section over budget (section={}, chars={}, budget={budget})",
                    kind.as_str(),
                    removed.text.chars().count()
                );
                dropped.push(kind);
            }
        }

        let over_budget = length > budget;
        if over_budget {
            warn!("user name alone exceeds prompt budget (chars={length}, budget={budget})");
        }
        (render(&sections), dropped, over_budget)
    }
}

fn render(sections: &[ContextSection]) -> String {
    sections.iter().map(|section| section.text.as_str()).collect()
}

fn consistency_section(context: &ConversationContext) -> Option<ContextSection> {
    let opinions = stated_opinions(context);
    let facts = stated_facts(context);
    if opinions.is_empty() && facts.is_empty() {
        return None;
    }
    let mut text = String::from("For consistency, here are opinions and facts I've previously stated:\n");
    for (heading, entries) in [("Opinions", &opinions), ("Facts", &facts)] {
        if entries.is_empty() {
            continue;
        }
        text.push_str(&format!("{heading}:\n"));
        for entry in entries {
            text.push_str(&format!("- {entry}\n"));
        }
    }
    text.push('\n');
    Some(ContextSection {
        kind: SectionKind::Consistency,
        text,
    })
}

fn topics_section(context: &ConversationContext) -> Option<ContextSection> {
    let mut text = String::new();
    if let Some(topic) = context.get(context_keys::CURRENT_TOPIC) {
        text.push_str(&format!("Current topic of conversation: {topic}\n"));
    }
    let previous = previous_topics(context);
    if !previous.is_empty() {
        text.push_str("Previous topics we've discussed:\n");
        for topic in &previous {
            text.push_str(&format!("- {topic}\n"));
        }
        text.push('\n');
    }
    (!text.is_empty()).then_some(ContextSection {
        kind: SectionKind::Topics,
        text,
    })
}

fn additional_section(context: &ConversationContext) -> Option<ContextSection> {
    let entries: Vec<_> = context
        .iter()
        .filter(|(key, _)| !DEDICATED_KEYS.contains(&key.as_str()))
        .collect();
    if entries.is_empty() {
        return None;
    }
    let mut text = String::from("Additional conversation context:\n");
    for (key, value) in entries {
        text.push_str(&format!("- {key}: {value}\n"));
    }
    text.push('\n');
    Some(ContextSection {
        kind: SectionKind::Additional,
        text,
    })
}
