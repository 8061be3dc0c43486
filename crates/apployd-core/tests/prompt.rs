//! Prompt assembly over seeded stores.

use apployd_core::PromptAssembler;
use apployd_memory::{MemoryLabel, MemoryType};
use apployd_test_utils::seeded_store;
use pretty_assertions::assert_eq;

/// Contact question answered by the important memory alone.
#[test]
fn contact_question_recalls_important_memory() {
    let store = seeded_store(&[
        (
            "My email is ada@example.com",
            MemoryType::Important,
            Some(MemoryLabel::Email),
        ),
        (
            "I work as a commercial pilot",
            MemoryType::LearnedFact,
            Some(MemoryLabel::Occupation),
        ),
    ])
    .expect("store");
    let prompt = PromptAssembler::new("SYS")
        .expect("assembler")
        .preview(&store, store.current_conversation_id(), "what is my email address?")
        .expect("prompt");

    assert_eq!(
        prompt.context,
        "Here are some relevant things I know about the user:\n- My email is ada@example.com\n\n"
    );
    assert_eq!(prompt.memories.len(), 1);
}

/// A question with no scoring keywords still finds memories through its label.
#[test]
fn occupation_question_falls_back_to_label() {
    let mut store = seeded_store(&[
        (
            "My email is ada@example.com",
            MemoryType::Important,
            Some(MemoryLabel::Email),
        ),
        (
            "I work as a commercial pilot",
            MemoryType::LearnedFact,
            Some(MemoryLabel::Occupation),
        ),
    ])
    .expect("store");
    let conversation = store.current_conversation_id();

    let prompt = PromptAssembler::new("SYS")
        .expect("assembler")
        .assemble(&mut store, conversation, "tell me about my job")
        .expect("prompt");

    assert!(
        prompt
            .context
            .contains("- I work as a commercial pilot\n")
    );
    assert!(!prompt.context.contains("ada@example.com"));
    let pilot = store.memories_with_label(MemoryLabel::Occupation);
    assert_eq!(pilot[0].access_count, 1);
}

/// General recall keeps store order among equal scores and honours the limit.
#[test]
fn general_recall_respects_limit() {
    let store = seeded_store(&[
        ("I drink coffee every morning", MemoryType::LearnedFact, None),
        (
            "My favorite coffee is espresso",
            MemoryType::UserPreference,
            Some(MemoryLabel::Favorite),
        ),
        ("Coffee makes me jittery", MemoryType::Context, None),
    ])
    .expect("store");
    let prompt = PromptAssembler::new("SYS")
        .expect("assembler")
        .with_recall_limits(2, 3)
        .preview(&store, store.current_conversation_id(), "recommend a coffee shop")
        .expect("prompt");

    assert_eq!(
        prompt.context,
        "Here are some relevant things I know about the user:\n\
         - I drink coffee every morning\n\
         - My favorite coffee is espresso\n\n"
    );
    assert_eq!(
        prompt.preamble,
        format!("SYS\n\nContext from memory:\n{}\n\n", prompt.context)
    );
}
