//! A chat session persisted to disk and listed the way the CLI prints it.

use apployd::config::ApploydConfig;
use apployd::core::{ChatEngine, open_store};
use apployd::memory::MemoryType;
use apployd::render::{conversation_line, memory_line};
use apployd_test_utils::FixedCompletion;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn session_survives_reopen() {
    let temp = tempdir().expect("tempdir");
    let mut config = ApploydConfig::default();
    config.memory.path = "state/memory.json".into();
    let engine = ChatEngine::from_config(
        &config,
        temp.path(),
        Arc::new(FixedCompletion::new("Noted, Grace.")),
    )
    .expect("engine");

    let mut store = open_store(&config.memory, temp.path()).expect("store");
    let conversation = store.current_conversation_id();
    engine
        .send(&mut store, conversation, "My name is Grace", &[])
        .await
        .expect("reply");
    drop(store);

    assert!(temp.path().join("state/memory.json").exists());
    let store = open_store(&config.memory, temp.path()).expect("reopen");
    assert_eq!(store.current_conversation_id(), conversation);

    let important = store.memories_by_type(MemoryType::Important);
    assert_eq!(important.len(), 1);
    assert!(memory_line(important[0]).contains("[important/name]  My name is Grace"));

    let conversations = store.conversations();
    assert_eq!(conversations.len(), 1);
    assert!(
        conversation_line(conversations[0], true)
            .contains("My name is Grace  (2 messages, updated ")
    );
}
