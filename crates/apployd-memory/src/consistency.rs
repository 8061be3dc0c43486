//! Rolling logs of opinions and facts stated in assistant replies.

use crate::error::MemoryError;
use crate::model::{ConversationContext, context_keys};
use crate::rolling::{CLAIM_DELIMITER, RollingLog};
use log::debug;
use regex::Regex;

/// Maximum entries kept in `statedOpinions`.
pub const MAX_OPINIONS: usize = 10;
/// Maximum entries kept in `statedFacts`.
pub const MAX_FACTS: usize = 15;

/// Fact claims must be longer than this to be logged.
const MIN_FACT_CLAIM_CHARS: usize = 10;

const CLAIM_TAIL: &str = r"(?P<claim>.+?)(?:[.!?](?:\s|$)|\n|$)";

const OPINION_PATTERNS: &[&str] = &[
    r"\bI (?:think|believe|feel|consider)(?: that)?\s+",
    r"\bIn my (?:opinion|view|assessment),?\s+",
    r"\bI would (?:recommend|suggest|advise)\s+",
];

const FACT_PATTERNS: &[&str] = &[
    r"\b(?:is|are|was|were)\s+",
    r"\b(?:has|have|had)\s+",
    r"\b(?:consists of|contains|includes)\s+",
];

/// Entries added by one reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyUpdate {
    pub opinions: Vec<String>,
    pub facts: Vec<String>,
}

/// Scans assistant replies for claims worth repeating back later.
pub struct ConsistencyTracker {
    opinions: Vec<Regex>,
    facts: Vec<Regex>,
}

fn compile(patterns: &[&str]) -> Result<Vec<Regex>, MemoryError> {
    patterns
        .iter()
        .map(|head| Regex::new(&format!("(?i){head}{CLAIM_TAIL}")).map_err(MemoryError::from))
        .collect()
}

/// Every match of `regex` as the text from the trigger through the claim.
fn claims<'t>(regex: &Regex, text: &'t str, min_chars: usize) -> Vec<&'t str> {
    regex
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let claim = caps.name("claim")?;
            if claim.as_str().trim().chars().count() <= min_chars {
                return None;
            }
            Some(text[whole.start()..claim.end()].trim())
        })
        .collect()
}

impl ConsistencyTracker {
    pub fn new() -> Result<Self, MemoryError> {
        Ok(Self {
            opinions: compile(OPINION_PATTERNS)?,
            facts: compile(FACT_PATTERNS)?,
        })
    }

    /// Append unique opinion and fact entries from `reply` to `context`.
    pub fn track(&self, reply: &str, context: &mut ConversationContext) -> ConsistencyUpdate {
        let mut update = ConsistencyUpdate::default();

        let mut opinions = RollingLog::parse(
            context.get(context_keys::STATED_OPINIONS).map(String::as_str),
            CLAIM_DELIMITER,
            MAX_OPINIONS,
        );
        for regex in &self.opinions {
            for claim in claims(regex, reply, 0) {
                if opinions.push_unique(claim) {
                    update.opinions.push(claim.to_string());
                }
            }
        }

        let mut facts = RollingLog::parse(
            context.get(context_keys::STATED_FACTS).map(String::as_str),
            CLAIM_DELIMITER,
            MAX_FACTS,
        );
        for regex in &self.facts {
            for claim in claims(regex, reply, MIN_FACT_CLAIM_CHARS) {
                if facts.push_unique(claim) {
                    update.facts.push(claim.to_string());
                }
            }
        }

        if !update.opinions.is_empty() {
            context.insert(context_keys::STATED_OPINIONS.to_string(), opinions.render());
        }
        if !update.facts.is_empty() {
            context.insert(context_keys::STATED_FACTS.to_string(), facts.render());
        }
        debug!(
            "consistency tracked (opinions_added={}, facts_added={})",
            update.opinions.len(),
            update.facts.len()
        );
        update
    }
}

/// Opinions previously stated in a conversation, oldest first.
pub fn stated_opinions(context: &ConversationContext) -> Vec<String> {
    read_log(context, context_keys::STATED_OPINIONS, MAX_OPINIONS)
}

/// Facts previously stated in a conversation, oldest first.
pub fn stated_facts(context: &ConversationContext) -> Vec<String> {
    read_log(context, context_keys::STATED_FACTS, MAX_FACTS)
}

fn read_log(context: &ConversationContext, key: &str, capacity: usize) -> Vec<String> {
    RollingLog::parse(context.get(key).map(String::as_str), CLAIM_DELIMITER, capacity)
        .entries()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tracker() -> ConsistencyTracker {
        ConsistencyTracker::new().expect("patterns compile")
    }

    #[test]
    fn identical_opinion_is_logged_once() {
        let tracker = tracker();
        let mut context = ConversationContext::new();
        tracker.track("I think Rust is safer than C.", &mut context);
        let second = tracker.track("I think Rust is safer than C.", &mut context);
        assert!(second.opinions.is_empty());
        assert_eq!(stated_opinions(&context), vec!["I think Rust is safer than C"]);
    }

    #[test]
    fn short_fact_claims_are_skipped() {
        let tracker = tracker();
        let mut context = ConversationContext::new();
        let update = tracker.track("It is red.", &mut context);
        assert!(update.facts.is_empty());
        assert!(!context.contains_key(context_keys::STATED_FACTS));
    }

    #[test]
    fn facts_collected_from_every_sentence() {
        let tracker = tracker();
        let mut context = ConversationContext::new();
        tracker.track(
            "Tokio is an asynchronous runtime. The crate has many optional features.",
            &mut context,
        );
        assert_eq!(
            stated_facts(&context),
            vec![
                "is an asynchronous runtime",
                "has many optional features"
            ]
        );
    }

    #[test]
    fn opinion_log_is_capped() {
        let tracker = tracker();
        let mut context = ConversationContext::new();
        for n in 0..12 {
            tracker.track(&format!("I believe option {n} works."), &mut context);
        }
        let opinions = stated_opinions(&context);
        assert_eq!(opinions.len(), MAX_OPINIONS);
        assert_eq!(opinions[0], "I believe option 2 works");
    }

    #[test]
    fn fact_log_is_capped() {
        let tracker = tracker();
        let mut context = ConversationContext::new();
        for n in 0..20 {
            tracker.track(&format!("Release {n} was built for platform {n}."), &mut context);
        }
        let facts = stated_facts(&context);
        assert_eq!(facts.len(), MAX_FACTS);
        assert_eq!(facts[0], "was built for platform 5");
        assert_eq!(facts[MAX_FACTS - 1], "was built for platform 19");
    }
}
