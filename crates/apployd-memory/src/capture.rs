//! Write side of a chat turn: record messages and run the analyzers.

use crate::consistency::{ConsistencyTracker, ConsistencyUpdate};
use crate::context::{ContextObservation, ContextTracker};
use crate::error::MemoryError;
use crate::extractor::FactExtractor;
use crate::model::{ChatMessage, ConversationId, MemoryId, MemoryLabel, context_keys};
use crate::policy::CapturePolicy;
use crate::store::MemoryStore;
use log::debug;

/// What recording a user message produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureReport {
    /// Memories created from the message, in rule order.
    pub memories: Vec<MemoryId>,
    /// Name written to `userName`, if the message disclosed one.
    pub user_name: Option<String>,
    pub observation: Option<ContextObservation>,
}

/// Fact extractor, context tracker, and consistency tracker behind one policy.
pub struct MemoryCapture {
    extractor: FactExtractor,
    context: ContextTracker,
    consistency: ConsistencyTracker,
    policy: CapturePolicy,
}

impl MemoryCapture {
    pub fn new(policy: CapturePolicy) -> Result<Self, MemoryError> {
        Ok(Self {
            extractor: FactExtractor::new()?,
            context: ContextTracker::new()?,
            consistency: ConsistencyTracker::new()?,
            policy,
        })
    }

    /// Append a user message, then extract facts and track context.
    pub fn record_user_message(
        &self,
        store: &mut MemoryStore,
        conversation: ConversationId,
        text: &str,
    ) -> Result<CaptureReport, MemoryError> {
        store.add_message(conversation, ChatMessage::user(text))?;
        let mut report = CaptureReport::default();

        if self.policy.extract_facts {
            for extraction in self.extractor.extract(text) {
                if extraction.label() == Some(MemoryLabel::Name)
                    && let Some(name) = extraction.value()
                {
                    store.set_context(conversation, context_keys::USER_NAME, name)?;
                    report.user_name = Some(name.to_string());
                }
                let id = store.add_memory(
                    Some(conversation),
                    extraction.text,
                    extraction.memory_type,
                    extraction.metadata,
                )?;
                report.memories.push(id);
            }
        }

        if self.policy.track_context {
            let observation =
                store.update_context(conversation, |context| self.context.track(text, context))?;
            report.observation = Some(observation);
        }

        debug!(
            "user message recorded (conversation_id={conversation}, memories={})",
            report.memories.len()
        );
        Ok(report)
    }

    /// Append an assistant reply and log its stated opinions and facts.
    pub fn record_assistant_message(
        &self,
        store: &mut MemoryStore,
        conversation: ConversationId,
        text: &str,
    ) -> Result<ConsistencyUpdate, MemoryError> {
        store.add_message(conversation, ChatMessage::assistant(text))?;
        if !self.policy.track_consistency {
            return Ok(ConsistencyUpdate::default());
        }
        store.update_context(conversation, |context| self.consistency.track(text, context))
    }
}
