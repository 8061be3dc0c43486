//! Detection of replies that admit missing knowledge.

use crate::error::PatternError;
use regex::RegexSet;

const UNCERTAINTY_PATTERNS: &[&str] = &[
    r"(?i)I don't have (enough|specific|detailed|current) information",
    r"(?i)I don't have access to",
    r"(?i)I'm not able to (provide|access|retrieve|find)",
    r"(?i)I cannot (provide|access|retrieve|find|determine|verify)",
    r"(?i)I'm (unable|not able) to",
    r"(?i)I (don't|do not) (know|have knowledge of)",
    r"(?i)I'm (not|unable to) (sure|certain)",
    r"(?i)(without|lacking) (more|additional|specific) (information|context|details)",
    r"(?i)my knowledge (is limited|has a cutoff)",
    r"(?i)my training (data|cutoff)",
    r"(?i)I (would need|need) (more|additional) (information|context|details)",
    r"(?i)I (can't|cannot) (determine|verify|confirm|check)",
    r"(?i)I'm not (familiar|updated|current) with",
    r"(?i)that's (beyond|outside) (my|the scope of my)",
    r"(?i)I (don't|do not) have (real-time|current|up-to-date)",
];

/// Matches replies that admit the model lacks the knowledge to answer.
#[derive(Debug, Clone)]
pub struct UncertaintyDetector {
    patterns: RegexSet,
}

impl UncertaintyDetector {
    pub fn new() -> Result<Self, PatternError> {
        Ok(Self {
            patterns: RegexSet::new(UNCERTAINTY_PATTERNS)?,
        })
    }

    pub fn is_uncertain(&self, text: &str) -> bool {
        self.patterns.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::UncertaintyDetector;

    #[test]
    fn flags_knowledge_gaps() {
        let detector = UncertaintyDetector::new().expect("detector");
        assert!(detector.is_uncertain("I don't have access to real-time stock prices."));
        assert!(detector.is_uncertain("My training data ends in 2024."));
        assert!(detector.is_uncertain("That's beyond my knowledge."));
    }

    #[test]
    fn ignores_confident_replies() {
        let detector = UncertaintyDetector::new().expect("detector");
        assert!(!detector.is_uncertain("Rust 1.0 was released in May 2015."));
    }
}
