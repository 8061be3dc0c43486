use apployd_memory::{
    CapturePolicy, FileStoreProvider, MemoryCapture, MemoryError, MemoryLabel, MemoryStore,
    MemoryType, RecallOptions, context_keys, previous_topics, stated_facts, stated_opinions,
};
use chrono::Utc;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::tempdir;

fn capture() -> MemoryCapture {
    MemoryCapture::new(CapturePolicy::default()).expect("capture")
}

#[test]
fn name_and_preference_become_two_records() {
    let capture = capture();
    let mut store = MemoryStore::in_memory().expect("store");
    let id = store.current_conversation_id();

    let report = capture
        .record_user_message(&mut store, id, "My name is Ada and I like chess.")
        .expect("record");

    assert_eq!(report.memories.len(), 2);
    let name = store.memories_with_label(MemoryLabel::Name);
    assert_eq!(name.len(), 1);
    assert_eq!(name[0].memory_type, MemoryType::Important);
    assert_eq!(name[0].metadata.value.as_deref(), Some("Ada"));
    let likes = store.memories_with_label(MemoryLabel::Likes);
    assert_eq!(likes.len(), 1);
    assert_eq!(likes[0].memory_type, MemoryType::UserPreference);
    assert_eq!(likes[0].metadata.value.as_deref(), Some("chess"));
    assert_eq!(store.context_value(id, context_keys::USER_NAME), Some("Ada"));

    let recalled = store.relevant_memories("what's my name?", RecallOptions::default());
    assert!(recalled.iter().any(|memory| memory.text.contains("Ada")));
}

#[test]
fn unmatched_message_creates_nothing() {
    let capture = capture();
    let mut store = MemoryStore::in_memory().expect("store");
    let id = store.current_conversation_id();
    for text in ["", "?!", "The build passed.", "ok"] {
        let report = capture
            .record_user_message(&mut store, id, text)
            .expect("record");
        assert!(report.memories.is_empty());
    }
    assert!(store.memories().is_empty());
}

#[test]
fn sixth_topic_evicts_the_first() {
    let capture = capture();
    let mut store = MemoryStore::in_memory().expect("store");
    let id = store.current_conversation_id();
    for topic in ["gardens", "volcanoes", "sailing", "pottery", "astronomy", "baking"] {
        capture
            .record_user_message(&mut store, id, &format!("Can we talk about {topic}?"))
            .expect("record");
    }
    let context = store.context(id).expect("context");
    assert_eq!(
        previous_topics(context),
        vec!["volcanoes", "sailing", "pottery", "astronomy", "baking"]
    );
}

#[test]
fn repeated_reply_does_not_duplicate_opinion() {
    let capture = capture();
    let mut store = MemoryStore::in_memory().expect("store");
    let id = store.current_conversation_id();
    for _ in 0..2 {
        capture
            .record_assistant_message(&mut store, id, "I think Rust is safer than C.")
            .expect("record");
    }
    let context = store.context(id).expect("context");
    assert_eq!(stated_opinions(context), vec!["I think Rust is safer than C"]);
    assert_eq!(stated_facts(context), vec!["is safer than C"]);
}

#[test]
fn reload_preserves_ranking() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("memory.json");
    let capture = capture();
    let now = Utc::now();

    let before: Vec<_> = {
        let mut store = MemoryStore::open_file(&path).expect("store");
        let id = store.current_conversation_id();
        for text in [
            "I live in Porto.",
            "I love hiking near Porto.",
            "Remember that my dentist appointment is Monday.",
            "I work at a bakery in Porto.",
        ] {
            capture
                .record_user_message(&mut store, id, text)
                .expect("record");
        }
        store
            .relevant_memories_at("porto weekend hiking", RecallOptions::default(), now)
            .iter()
            .map(|scored| scored.memory.id)
            .collect()
    };
    assert!(!before.is_empty());

    let store = MemoryStore::open_file(&path).expect("reopen");
    let after: Vec<_> = store
        .relevant_memories_at("porto weekend hiking", RecallOptions::default(), now)
        .iter()
        .map(|scored| scored.memory.id)
        .collect();
    assert_eq!(before, after);
}

#[test]
fn concurrent_writer_is_detected() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("memory.json");
    let mut first = MemoryStore::open(Arc::new(FileStoreProvider::new(&path).expect("provider")))
        .expect("first");
    let mut second = MemoryStore::open(Arc::new(FileStoreProvider::new(&path).expect("provider")))
        .expect("second");

    second.create_conversation().expect("second writes");
    let err = first.create_conversation().expect_err("stale write");
    assert!(matches!(err, MemoryError::Conflict { .. }));

    first.reload().expect("reload");
    assert_eq!(first.revision(), second.revision());
    first.create_conversation().expect("write after reload");
}

#[test]
fn corrupt_store_is_replaced() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("memory.json");
    std::fs::write(&path, "{ definitely not json").expect("write");
    let store = MemoryStore::open_file(&path).expect("open");
    assert!(store.memories().is_empty());
    assert_eq!(store.conversations().len(), 1);
}
