//! Per-conversation context tracking over user utterances.

use crate::error::MemoryError;
use crate::model::{ConversationContext, context_keys};
use crate::rolling::{RollingLog, TOPIC_DELIMITER};
use log::debug;
use regex::{Regex, RegexSet};

/// Maximum distinct topics kept in `previousTopics`.
pub const MAX_PREVIOUS_TOPICS: usize = 5;

/// Topics must be longer than this many characters to count.
const MIN_TOPIC_CHARS: usize = 3;

const TOPIC_PATTERNS: &[&str] = &[
    r"(?i)\b(?:talk|discuss|tell me) about\s+(?P<topic>.+?)(?:[.!?](?:\s|$)|$)",
    r"(?i)\b(?:explain|describe)\s+(?P<topic>.+?)(?:[.!?](?:\s|$)|$)",
    r"(?i)\b(?:how|what|why|when|where|who) (?:is|are|was|were)\s+(?P<topic>.+?)(?:\?|[.!](?:\s|$)|$)",
];

const SENTIMENT_PATTERNS: &[(&str, Sentiment)] = &[
    (
        r"(?i)\b(?:i am|i['’]m) (?:happy|excited|glad|pleased|delighted)\b",
        Sentiment::Positive,
    ),
    (
        r"(?i)\b(?:i am|i['’]m) (?:sad|upset|angry|frustrated|disappointed)\b",
        Sentiment::Negative,
    ),
    (
        r"(?i)\b(?:i am|i['’]m) (?:confused|unsure|uncertain)\b",
        Sentiment::Confused,
    ),
    (
        r"(?i)\b(?:i am|i['’]m) (?:curious|interested|intrigued)\b",
        Sentiment::Curious,
    ),
];

const CODE_PATTERNS: &[&str] = &[
    r"(?i)\b(?:write|create|generate|give me) (?:a|some|the) code\b",
    r"(?i)\b(?:write|create|generate) (?:a|an) (?:function|class|program|script|app|application)\b",
    r"(?i)\b(?:how to|can you) (?:code|program|implement|develop)\b",
    r"(?i)\b(?:html|css|javascript|typescript|python|java|php|ruby|swift|kotlin|golang|rust)\b",
    r"(?i)\bc\+\+",
];

/// Detected user mood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Positive,
    Negative,
    Confused,
    Curious,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Confused => "confused",
            Sentiment::Curious => "curious",
        }
    }
}

/// Rough message complexity from length and word size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        }
    }
}

/// Estimate complexity: more than 30 words or average word length above 6 is
/// moderate; more than 50 words or average above 7 is complex.
pub fn estimate_complexity(text: &str) -> Complexity {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Complexity::Simple;
    }
    let letters: usize = words
        .iter()
        .map(|word| {
            word.chars()
                .filter(|ch| ch.is_alphanumeric() || *ch == '_')
                .count()
        })
        .sum();
    let count = words.len();
    let average = letters as f64 / count as f64;
    if count > 50 || average > 7.0 {
        Complexity::Complex
    } else if count > 30 || average > 6.0 {
        Complexity::Moderate
    } else {
        Complexity::Simple
    }
}

/// Everything the tracker noticed in one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextObservation {
    /// Topics in pattern order; the last one becomes the current topic.
    pub topics: Vec<String>,
    pub sentiment: Option<Sentiment>,
    pub complexity: Complexity,
    pub wants_code: bool,
}

/// Detects topic, sentiment, complexity, and code intent.
pub struct ContextTracker {
    topics: Vec<Regex>,
    sentiments: Vec<(Regex, Sentiment)>,
    code: RegexSet,
}

impl ContextTracker {
    /// Compile the detector patterns.
    pub fn new() -> Result<Self, MemoryError> {
        let topics = TOPIC_PATTERNS
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;
        let sentiments = SENTIMENT_PATTERNS
            .iter()
            .map(|(pattern, sentiment)| Regex::new(pattern).map(|regex| (regex, *sentiment)))
            .collect::<Result<Vec<_>, _>>()?;
        let code = RegexSet::new(CODE_PATTERNS)?;
        Ok(Self {
            topics,
            sentiments,
            code,
        })
    }

    /// Run all detectors without touching any context.
    pub fn observe(&self, text: &str) -> ContextObservation {
        let mut topics = Vec::new();
        for regex in &self.topics {
            let Some(topic) = regex.captures(text).and_then(|caps| caps.name("topic")) else {
                continue;
            };
            let topic = topic.as_str().trim();
            if topic.chars().count() > MIN_TOPIC_CHARS {
                topics.push(topic.to_string());
            }
        }
        let sentiment = self
            .sentiments
            .iter()
            .find(|(regex, _)| regex.is_match(text))
            .map(|(_, sentiment)| *sentiment);
        ContextObservation {
            topics,
            sentiment,
            complexity: estimate_complexity(text),
            wants_code: self.code.is_match(text),
        }
    }

    /// Write an observation into a conversation context. Last value wins per key.
    pub fn apply(&self, observation: &ContextObservation, context: &mut ConversationContext) {
        if !observation.topics.is_empty() {
            let mut previous = RollingLog::parse(
                context
                    .get(context_keys::PREVIOUS_TOPICS)
                    .map(String::as_str),
                TOPIC_DELIMITER,
                MAX_PREVIOUS_TOPICS,
            );
            for topic in &observation.topics {
                context.insert(context_keys::CURRENT_TOPIC.to_string(), topic.clone());
                previous.push_unique(topic);
            }
            context.insert(
                context_keys::PREVIOUS_TOPICS.to_string(),
                previous.render(),
            );
        }
        if let Some(sentiment) = observation.sentiment {
            context.insert(
                context_keys::USER_SENTIMENT.to_string(),
                sentiment.as_str().to_string(),
            );
        }
        context.insert(
            context_keys::CONVERSATION_COMPLEXITY.to_string(),
            observation.complexity.as_str().to_string(),
        );
        if observation.wants_code {
            context.insert(context_keys::USER_WANTS_CODE.to_string(), "true".to_string());
        }
    }

    /// Observe `text` and apply the result to `context`.
    pub fn track(&self, text: &str, context: &mut ConversationContext) -> ContextObservation {
        let observation = self.observe(text);
        self.apply(&observation, context);
        debug!(
            "context tracked (topics={}, sentiment={}, complexity={}, wants_code={})",
            observation.topics.len(),
            observation.sentiment.map_or("none", |s| s.as_str()),
            observation.complexity.as_str(),
            observation.wants_code
        );
        observation
    }
}

/// Previous topics stored in a context, oldest first.
pub fn previous_topics(context: &ConversationContext) -> Vec<String> {
    RollingLog::parse(
        context
            .get(context_keys::PREVIOUS_TOPICS)
            .map(String::as_str),
        TOPIC_DELIMITER,
        MAX_PREVIOUS_TOPICS,
    )
    .entries()
    .map(str::to_string)
    .collect()
}
