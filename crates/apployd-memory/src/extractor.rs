//! Fact and preference extraction from user utterances.
//!
//! Extraction is a fixed, ordered table of rules. Each rule contributes at
//! most one record per utterance; rules are independent, so one sentence can
//! yield several records.

use crate::error::MemoryError;
use crate::keywords::extract_keywords;
use crate::model::{Importance, MemoryLabel, MemoryMetadata, MemoryType};
use log::debug;
use regex::Regex;

/// Terminates a captured value: a conjunction, clause punctuation, or end of text.
const TAIL: &str = r"(?P<value>.+?)(?:\s+(?:and|but)\s|[.,;!?](?:\s|$)|$)";

/// Family a rule belongs to; fixes the record type and importance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleGroup {
    /// Self-disclosed identity ("my name is ...").
    Identity,
    /// Likes, dislikes, favorites.
    Preference,
    /// Explicit requests to remember something.
    ExplicitRequest,
    /// Incidental statements about the user.
    ImplicitFact,
}

impl RuleGroup {
    pub fn memory_type(self) -> MemoryType {
        match self {
            RuleGroup::Identity => MemoryType::Important,
            RuleGroup::Preference => MemoryType::UserPreference,
            RuleGroup::ExplicitRequest | RuleGroup::ImplicitFact => MemoryType::LearnedFact,
        }
    }

    pub fn importance(self) -> Importance {
        match self {
            RuleGroup::Identity | RuleGroup::ExplicitRequest => Importance::High,
            RuleGroup::Preference => Importance::Medium,
            RuleGroup::ImplicitFact => Importance::Low,
        }
    }
}

struct RuleSpec {
    group: RuleGroup,
    label: Option<MemoryLabel>,
    /// Case-insensitive pattern; `{tail}` expands to the value capture.
    pattern: &'static str,
}

const RULES: &[RuleSpec] = &[
    RuleSpec {
        group: RuleGroup::Identity,
        label: Some(MemoryLabel::Name),
        pattern: r"\bmy name is\s+{tail}",
    },
    RuleSpec {
        group: RuleGroup::Identity,
        label: Some(MemoryLabel::Age),
        pattern: r"\b(?:i am|i['’]m)\s+(?P<value>\d+)\s+years? old\b",
    },
    RuleSpec {
        group: RuleGroup::Identity,
        label: Some(MemoryLabel::Birthday),
        pattern: r"\bmy birthday is\s+{tail}",
    },
    RuleSpec {
        group: RuleGroup::Identity,
        label: Some(MemoryLabel::Location),
        pattern: r"\bi live in\s+{tail}",
    },
    RuleSpec {
        group: RuleGroup::Identity,
        label: Some(MemoryLabel::Occupation),
        pattern: r"\bi work (?:at|for|as)\s+{tail}",
    },
    RuleSpec {
        group: RuleGroup::Identity,
        label: Some(MemoryLabel::Email),
        pattern: r"\bmy email(?: address)? is\s+{tail}",
    },
    RuleSpec {
        group: RuleGroup::Identity,
        label: Some(MemoryLabel::Phone),
        pattern: r"\bmy phone(?: number)?(?: is)?\s+{tail}",
    },
    RuleSpec {
        group: RuleGroup::Preference,
        label: Some(MemoryLabel::Likes),
        pattern: r"\bi (?:really )?(?:like|love|enjoy|prefer)\s+{tail}",
    },
    RuleSpec {
        group: RuleGroup::Preference,
        label: Some(MemoryLabel::Dislikes),
        pattern: r"\bi (?:dislike|hate|don['’]t like|do not like)\s+{tail}",
    },
    RuleSpec {
        group: RuleGroup::Preference,
        label: Some(MemoryLabel::Favorite),
        pattern: r"\bmy favou?rite\s+(?P<subject>.+?)\s+is\s+{tail}",
    },
    RuleSpec {
        group: RuleGroup::Preference,
        label: Some(MemoryLabel::Allergy),
        pattern: r"\b(?:i am|i['’]m) allergic to\s+{tail}",
    },
    RuleSpec {
        group: RuleGroup::ExplicitRequest,
        label: Some(MemoryLabel::Explicit),
        pattern: r"\bremember that\s+{tail}",
    },
    RuleSpec {
        group: RuleGroup::ExplicitRequest,
        label: Some(MemoryLabel::Explicit),
        pattern: r"\bdon['’]t forget(?: that)?\s+{tail}",
    },
    RuleSpec {
        group: RuleGroup::ExplicitRequest,
        label: Some(MemoryLabel::Explicit),
        pattern: r"\bnote that\s+{tail}",
    },
    RuleSpec {
        group: RuleGroup::ExplicitRequest,
        label: Some(MemoryLabel::Explicit),
        pattern: r"\bkeep in mind that\s+{tail}",
    },
    RuleSpec {
        group: RuleGroup::ImplicitFact,
        label: None,
        pattern: r"\bi (?:am|have been)\s+{tail}",
    },
    RuleSpec {
        group: RuleGroup::ImplicitFact,
        label: None,
        pattern: r"\bi (?:have|own)\s+{tail}",
    },
    RuleSpec {
        group: RuleGroup::ImplicitFact,
        label: None,
        pattern: r"\bi (?:went to|graduated from)\s+{tail}",
    },
    RuleSpec {
        group: RuleGroup::ImplicitFact,
        label: None,
        pattern: r"\bi (?:speak|understand)\s+{tail}",
    },
];

struct CompiledRule {
    group: RuleGroup,
    label: Option<MemoryLabel>,
    regex: Regex,
    /// The record text stops at the value instead of the whole match.
    ends_at_value: bool,
}

/// A record candidate produced by one matching rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Matched fragment of the utterance.
    pub text: String,
    pub memory_type: MemoryType,
    pub metadata: MemoryMetadata,
}

impl Extraction {
    pub fn label(&self) -> Option<MemoryLabel> {
        self.metadata.label
    }

    pub fn value(&self) -> Option<&str> {
        self.metadata.value.as_deref()
    }
}

/// Applies the rule table to user utterances.
pub struct FactExtractor {
    rules: Vec<CompiledRule>,
}

impl FactExtractor {
    /// Compile the rule table.
    ///
    /// # Errors
    /// Returns [`MemoryError::Regex`] if a rule fails to compile.
    pub fn new() -> Result<Self, MemoryError> {
        let mut rules = Vec::with_capacity(RULES.len());
        for spec in RULES {
            let ends_at_value = spec.pattern.contains("{tail}");
            let source = format!("(?i){}", spec.pattern.replace("{tail}", TAIL));
            rules.push(CompiledRule {
                group: spec.group,
                label: spec.label,
                regex: Regex::new(&source)?,
                ends_at_value,
            });
        }
        Ok(Self { rules })
    }

    /// Run every rule against `text`, returning matches in rule order.
    ///
    /// Never fails; text that matches nothing yields an empty list.
    pub fn extract(&self, text: &str) -> Vec<Extraction> {
        let mut extractions = Vec::new();
        for rule in &self.rules {
            let Some(caps) = rule.regex.captures(text) else {
                continue;
            };
            let (Some(whole), Some(value)) = (caps.get(0), caps.name("value")) else {
                continue;
            };
            let trimmed_value = value.as_str().trim();
            if trimmed_value.is_empty() {
                continue;
            }
            let end = if rule.ends_at_value {
                value.end()
            } else {
                whole.end()
            };
            let fragment = text[whole.start()..end].trim().to_string();
            let metadata = MemoryMetadata {
                keywords: extract_keywords(&fragment),
                pattern: Some(rule.regex.as_str().to_string()),
                importance: Some(rule.group.importance()),
                label: rule.label,
                value: Some(trimmed_value.to_string()),
                subject: caps.name("subject").map(|m| m.as_str().trim().to_string()),
                extracted_from: Some(text.to_string()),
            };
            extractions.push(Extraction {
                text: fragment,
                memory_type: rule.group.memory_type(),
                metadata,
            });
        }
        debug!(
            "fact extraction finished (text_len={}, matches={})",
            text.len(),
            extractions.len()
        );
        extractions
    }
}
