//! Chat engine integration tests with stub completion providers.

use apployd_config::{ApploydConfig, PromptConfig};
use apployd_core::{ApploydCoreError, ChatEngine, PromptAssembler};
use apployd_memory::{
    CapturePolicy, MemoryError, MemoryLabel, MemoryStore, Sender, context_keys, stated_opinions,
};
use apployd_protocol::{CompletionProvider, ResponseSegment, Turn, TurnRole};
use apployd_test_utils::{
    FailingCompletion, FailingStore, FixedCompletion, RecordingCompletion, StreamingCompletion,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::tempdir;

const INSTRUCTIONS: &str = "You are a test assistant.";

fn engine(provider: Arc<dyn CompletionProvider>) -> ChatEngine {
    let assembler = PromptAssembler::new(INSTRUCTIONS).expect("assembler");
    ChatEngine::new(provider, assembler).expect("engine")
}

fn store() -> MemoryStore {
    MemoryStore::in_memory().expect("store")
}

/// A first message is captured, answered, and both sides land in the transcript.
#[tokio::test]
async fn first_turn_records_memories_and_reply() {
    let engine = engine(Arc::new(FixedCompletion::new(
        "Nice to meet you, Ada! I think chess is a wonderful game.",
    )));
    let mut store = store();
    let id = store.current_conversation_id();

    let reply = engine
        .send(&mut store, id, "My name is Ada and I like chess.", &[])
        .await
        .expect("reply");

    assert_eq!(reply.capture.memories.len(), 2);
    assert_eq!(reply.capture.user_name.as_deref(), Some("Ada"));
    assert!(!reply.uncertain);
    assert_eq!(
        reply.consistency.opinions,
        vec!["I think chess is a wonderful game".to_string()]
    );

    let conversation = store.conversation(id).expect("conversation");
    let senders: Vec<_> = conversation.messages.iter().map(|m| m.sender).collect();
    assert_eq!(senders, vec![Sender::User, Sender::Assistant]);
    assert_eq!(conversation.title, "My name is Ada and I like ches...");
    assert_eq!(
        stated_opinions(&conversation.context),
        vec!["I think chess is a wonderful game".to_string()]
    );
}

/// A later personal question carries the name and the recalled memory.
#[tokio::test]
async fn personal_question_prompt_includes_known_name() {
    let recorder = RecordingCompletion::new("Your name is Ada.");
    let engine = engine(Arc::new(recorder.clone()));
    let mut store = store();
    let id = store.current_conversation_id();

    engine
        .send(&mut store, id, "My name is Ada and I like chess.", &[])
        .await
        .expect("first");
    engine
        .send(&mut store, id, "what's my name?", &[])
        .await
        .expect("second");

    let request = recorder.last_request().expect("request");
    assert_eq!(request.turns.len(), 1);
    let prompt = &request.turns[0].text;
    assert!(prompt.starts_with("You are a test assistant.\n\nContext from memory:\n"));
    assert!(prompt.contains("The user's name is Ada.\n\n"));
    assert!(prompt.contains("Here are some relevant things I know about the user:\n- My name is Ada\n"));
    assert!(prompt.ends_with("\n\nwhat's my name?"));

    // Recalled by both prompts, since the first message already names the user.
    let name = store.memories_with_label(MemoryLabel::Name);
    assert_eq!(name[0].access_count, 2);
}

/// Stored history is replayed with the preamble on its first user turn.
#[tokio::test]
async fn stored_history_is_replayed_with_preamble() {
    let recorder = RecordingCompletion::new("Sure.");
    let engine = engine(Arc::new(recorder.clone()));
    let mut store = store();
    let id = store.current_conversation_id();

    engine
        .send(&mut store, id, "Tell me about sailing.", &[])
        .await
        .expect("first");
    let history = engine.stored_history(&store, id).expect("history");
    assert_eq!(history.len(), 2);

    engine
        .send(&mut store, id, "And knots?", &history)
        .await
        .expect("second");

    let request = recorder.last_request().expect("request");
    let roles: Vec<_> = request.turns.iter().map(|turn| turn.role).collect();
    assert_eq!(roles, vec![TurnRole::User, TurnRole::Model, TurnRole::User]);
    assert!(request.turns[0].text.starts_with(INSTRUCTIONS));
    assert!(request.turns[0].text.ends_with("Tell me about sailing."));
    assert_eq!(request.turns[1], Turn::model("Sure."));
    assert_eq!(request.turns[2], Turn::user("And knots?"));
}

/// History opening with a model turn is dropped rather than sent.
#[tokio::test]
async fn invalid_history_is_discarded() {
    let recorder = RecordingCompletion::new("Hello.");
    let engine = engine(Arc::new(recorder.clone()));
    let mut store = store();
    let id = store.current_conversation_id();

    engine
        .send(&mut store, id, "hi", &[Turn::model("Welcome back!")])
        .await
        .expect("reply");

    let request = recorder.last_request().expect("request");
    assert_eq!(request.turns.len(), 1);
    assert!(request.turns[0].text.ends_with("hi"));
}

/// Upstream failures keep the user message and surface a readable error.
#[tokio::test]
async fn upstream_failure_keeps_user_message() {
    let engine = engine(Arc::new(
        FailingCompletion::new("RESOURCE_EXHAUSTED: quota exceeded").with_status(429),
    ));
    let mut store = store();
    let id = store.current_conversation_id();

    let err = engine
        .send(&mut store, id, "hello", &[])
        .await
        .expect_err("failure");
    assert!(matches!(err, ApploydCoreError::Completion(_)));
    assert_eq!(
        err.user_message(),
        "API quota exceeded. Please try again later."
    );
    let messages = &store.conversation(id).expect("conversation").messages;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender, Sender::User);
}

/// Streaming reports cumulative text and records the joined reply.
#[tokio::test]
async fn streaming_reports_cumulative_text() {
    let engine = engine(Arc::new(StreamingCompletion::new(vec![
        "Hel".to_string(),
        "lo there".to_string(),
    ])));
    let mut store = store();
    let id = store.current_conversation_id();
    let mut updates = Vec::new();

    let reply = engine
        .send_streaming(&mut store, id, "greet me", &[], |text| {
            updates.push(text.to_string())
        })
        .await
        .expect("reply");

    assert_eq!(updates, vec!["Hel".to_string(), "Hello there".to_string()]);
    assert_eq!(reply.text, "Hello there");
    let messages = &store.conversation(id).expect("conversation").messages;
    assert_eq!(messages.last().map(|m| m.text.as_str()), Some("Hello there"));
}

/// Replies are split into immersive segments and flagged when uncertain.
#[tokio::test]
async fn reply_segments_and_uncertainty() {
    let engine = engine(Arc::new(FixedCompletion::new(
        "I don't have access to live data, but here is a sketch.\n\
<immersive> id=\"plan\" type=\"text\" title=\"Plan\">Step one</immersive>",
    )));
    let mut store = store();
    let id = store.current_conversation_id();

    let reply = engine
        .send(&mut store, id, "plan my week", &[])
        .await
        .expect("reply");

    assert!(reply.uncertain);
    assert_eq!(reply.segments.len(), 2);
    match &reply.segments[1] {
        ResponseSegment::Immersive(block) => {
            assert_eq!(block.id, "plan");
            assert_eq!(block.title, "Plan");
            assert_eq!(block.content, "Step one");
        }
        other => panic!("unexpected segment: {other:?}"),
    }
}

/// Config supplies instructions, capture policy, and budget.
#[tokio::test]
async fn from_config_applies_prompt_and_capture_settings() {
    let recorder = RecordingCompletion::new("I think so.");
    let mut config = ApploydConfig::builder()
        .prompt(PromptConfig {
            system_prompt: Some("Be brief.".to_string()),
            ..PromptConfig::default()
        })
        .build();
    config.memory.capture.track_consistency = false;
    let temp = tempdir().expect("tempdir");
    let engine =
        ChatEngine::from_config(&config, temp.path(), Arc::new(recorder.clone())).expect("engine");
    let mut store = store();
    let id = store.current_conversation_id();

    let reply = engine
        .send(&mut store, id, "hello", &[])
        .await
        .expect("reply");

    assert!(reply.consistency.opinions.is_empty());
    assert_eq!(store.context_value(id, context_keys::STATED_OPINIONS), None);
    let request = recorder.last_request().expect("request");
    assert!(request.turns[0].text.starts_with("Be brief.\n\n"));
    assert!((request.generation.temperature - 0.7).abs() < 1e-6);
}

/// A transcript-only policy records messages without analysis.
#[tokio::test]
async fn transcript_only_policy_skips_capture() {
    let engine = engine(Arc::new(FixedCompletion::new("Hi Ada.")))
        .with_capture_policy(CapturePolicy::transcript_only())
        .expect("policy");
    let mut store = store();
    let id = store.current_conversation_id();

    let reply = engine
        .send(&mut store, id, "My name is Ada.", &[])
        .await
        .expect("reply");

    assert!(reply.capture.memories.is_empty());
    assert!(store.memories().is_empty());
    assert_eq!(store.conversation(id).expect("conversation").messages.len(), 2);
}

/// A store that cannot save fails the turn with a memory error.
#[tokio::test]
async fn store_save_failure_is_reported() {
    let engine = engine(Arc::new(FixedCompletion::new("unused")));
    let mut store = MemoryStore::open(Arc::new(FailingStore::after_saves(1))).expect("store");
    let id = store.current_conversation_id();

    let err = engine
        .send(&mut store, id, "hello", &[])
        .await
        .expect_err("save failure");
    assert!(matches!(err, ApploydCoreError::Memory(MemoryError::Io(_))));
}
