//! Keyword extraction shared by memory capture and relevance scoring.

/// Words too common to say anything about relevance.
const STOPWORDS: &[&str] = &[
    "that", "this", "with", "from", "have", "what", "when", "where", "which", "there", "their",
    "about",
];

/// Minimum keyword length, exclusive.
const MIN_KEYWORD_LEN: usize = 3;

/// Extract distinct lowercase keywords from `text`, in order of first appearance.
///
/// Punctuation is removed before splitting, so `what's` becomes `whats`.
/// Words of three characters or fewer and stopwords are dropped.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|ch| ch.is_alphanumeric() || ch.is_whitespace() || *ch == '_')
        .collect();
    let mut keywords: Vec<String> = Vec::new();
    for word in cleaned.split_whitespace() {
        if word.chars().count() <= MIN_KEYWORD_LEN || STOPWORDS.contains(&word) {
            continue;
        }
        if !keywords.iter().any(|existing| existing == word) {
            keywords.push(word.to_string());
        }
    }
    keywords
}
