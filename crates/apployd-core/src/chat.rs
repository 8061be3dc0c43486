//! Per-turn chat control flow over the memory store and a completion provider.

use crate::error::ApploydCoreError;
use crate::memory::{capture_policy_from_config, generation_from_config, history_turns};
use crate::prompt::{AssembledPrompt, PromptAssembler};
use apployd_config::ApploydConfig;
use apployd_memory::{
    CapturePolicy, CaptureReport, ConsistencyUpdate, ConversationId, DEFAULT_HISTORY_LIMIT,
    MemoryCapture, MemoryStore,
};
use apployd_protocol::{
    CompletionError, CompletionProvider, CompletionRequest, GenerationConfig, ImmersiveParser,
    ResponseSegment, SafetySetting, Turn, TurnRole, UncertaintyDetector, default_safety_settings,
};
use futures_util::StreamExt;
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;

/// Result of a completed chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    /// Full reply text as recorded in the transcript.
    pub text: String,
    /// Reply split into plain text and immersive blocks.
    pub segments: Vec<ResponseSegment>,
    /// Whether the reply admits missing knowledge.
    pub uncertain: bool,
    /// What recording the user message produced.
    pub capture: CaptureReport,
    /// Claims logged from the reply.
    pub consistency: ConsistencyUpdate,
}

/// Drives one message through capture, prompt assembly, completion, and recording.
pub struct ChatEngine {
    provider: Arc<dyn CompletionProvider>,
    assembler: PromptAssembler,
    capture: MemoryCapture,
    immersive: ImmersiveParser,
    uncertainty: UncertaintyDetector,
    generation: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
    history_limit: usize,
}

impl ChatEngine {
    /// Create an engine with default capture policy and decoding parameters.
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        assembler: PromptAssembler,
    ) -> Result<Self, ApploydCoreError> {
        Ok(Self {
            provider,
            assembler,
            capture: MemoryCapture::new(CapturePolicy::default())?,
            immersive: ImmersiveParser::new()?,
            uncertainty: UncertaintyDetector::new()?,
            generation: GenerationConfig::default(),
            safety_settings: default_safety_settings(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        })
    }

    /// Build an engine from config; the system prompt file resolves against `cwd`.
    pub fn from_config(
        config: &ApploydConfig,
        cwd: &Path,
        provider: Arc<dyn CompletionProvider>,
    ) -> Result<Self, ApploydCoreError> {
        let today = chrono::Local::now().date_naive();
        let assembler = PromptAssembler::from_config(config, cwd, today)?;
        Ok(Self {
            provider,
            assembler,
            capture: MemoryCapture::new(capture_policy_from_config(&config.memory.capture))?,
            immersive: ImmersiveParser::new()?,
            uncertainty: UncertaintyDetector::new()?,
            generation: generation_from_config(&config.completion),
            safety_settings: config.completion.safety_settings.clone(),
            history_limit: config.memory.history_limit,
        })
    }

    pub fn with_capture_policy(mut self, policy: CapturePolicy) -> Result<Self, ApploydCoreError> {
        self.capture = MemoryCapture::new(policy)?;
        Ok(self)
    }

    pub fn assembler(&self) -> &PromptAssembler {
        &self.assembler
    }

    /// Stored transcript of `conversation` as completion turns, up to the history limit.
    pub fn stored_history(
        &self,
        store: &MemoryStore,
        conversation: ConversationId,
    ) -> Result<Vec<Turn>, ApploydCoreError> {
        let messages = store.conversation_history(conversation, self.history_limit)?;
        Ok(history_turns(messages))
    }

    /// Record the user message and build the completion request for it.
    ///
    /// History that does not start with a user turn is discarded. Otherwise the
    /// preamble is prefixed to the first history turn and the message is sent
    /// as its own final turn.
    pub fn prepare(
        &self,
        store: &mut MemoryStore,
        conversation: ConversationId,
        message: &str,
        history: &[Turn],
    ) -> Result<(CompletionRequest, CaptureReport), ApploydCoreError> {
        let capture = self
            .capture
            .record_user_message(store, conversation, message)?;
        let prompt = self.assembler.assemble(store, conversation, message)?;
        let turns = build_turns(&prompt, message, history);
        let request = CompletionRequest::new(turns)
            .with_generation(self.generation)
            .with_safety_settings(self.safety_settings.clone());
        Ok((request, capture))
    }

    /// Run one chat turn and record the reply.
    pub async fn send(
        &self,
        store: &mut MemoryStore,
        conversation: ConversationId,
        message: &str,
        history: &[Turn],
    ) -> Result<ChatReply, ApploydCoreError> {
        let (request, capture) = self.prepare(store, conversation, message, history)?;
        debug!(
            "sending completion request (conversation_id={conversation}, turns={})",
            request.turns.len()
        );
        let text = self.provider.complete(&request).await?;
        self.finish(store, conversation, text, capture)
    }

    /// Run one chat turn as a stream.
    ///
    /// `on_update` receives the cumulative reply text after every delta. The
    /// full reply is recorded once the stream ends.
    pub async fn send_streaming(
        &self,
        store: &mut MemoryStore,
        conversation: ConversationId,
        message: &str,
        history: &[Turn],
        mut on_update: impl FnMut(&str) + Send,
    ) -> Result<ChatReply, ApploydCoreError> {
        let (request, capture) = self.prepare(store, conversation, message, history)?;
        let mut stream = self.provider.complete_stream(&request).await?;
        let mut text = String::new();
        while let Some(delta) = stream.next().await {
            text.push_str(&delta?);
            on_update(&text);
        }
        if text.is_empty() {
            return Err(CompletionError::EmptyResponse.into());
        }
        self.finish(store, conversation, text, capture)
    }

    fn finish(
        &self,
        store: &mut MemoryStore,
        conversation: ConversationId,
        text: String,
        capture: CaptureReport,
    ) -> Result<ChatReply, ApploydCoreError> {
        let consistency = self
            .capture
            .record_assistant_message(store, conversation, &text)?;
        let uncertain = self.uncertainty.is_uncertain(&text);
        if uncertain {
            info!("reply admits missing knowledge (conversation_id={conversation})");
        }
        Ok(ChatReply {
            segments: self.immersive.split(&text),
            uncertain,
            capture,
            consistency,
            text,
        })
    }
}

fn build_turns(prompt: &AssembledPrompt, message: &str, history: &[Turn]) -> Vec<Turn> {
    let history: &[Turn] = match history.first() {
        Some(first) if first.role != TurnRole::User => {
            warn!(
                "discarding history that does not start with a user turn (turns={})",
                history.len()
            );
            &[]
        }
        _ => history,
    };
    let Some((first, rest)) = history.split_first() else {
        return vec![Turn::user(prompt.enhance(message))];
    };
    let mut turns = Vec::with_capacity(history.len() + 1);
    turns.push(Turn::user(prompt.enhance(&first.text)));
    turns.extend(rest.iter().cloned());
    turns.push(Turn::user(message));
    turns
}
