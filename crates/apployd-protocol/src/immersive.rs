//! Parsing of `<immersive>` document blocks embedded in replies.

use crate::error::PatternError;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Rich document or code block emitted by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImmersiveBlock {
    pub id: String,
    /// Block type as declared by the model (`text`, `code`, ...).
    pub kind: String,
    pub title: String,
    pub content: String,
}

/// Ordered piece of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSegment {
    /// Plain chat text.
    Text(String),
    /// Immersive document block.
    Immersive(ImmersiveBlock),
}

const IMMERSIVE_PATTERN: &str =
    r#"(?s)<immersive>\s*id="([^"]+)"\s*type="([^"]+)"\s*title="([^"]+)"\s*>?(.*?)</immersive>"#;

fn block_from_captures(caps: &regex::Captures<'_>) -> ImmersiveBlock {
    let field = |idx: usize| caps.get(idx).map_or("", |m| m.as_str());
    ImmersiveBlock {
        id: field(1).to_string(),
        kind: field(2).to_string(),
        title: field(3).to_string(),
        content: field(4).trim().to_string(),
    }
}

/// Finds `<immersive>` blocks in reply text.
#[derive(Debug, Clone)]
pub struct ImmersiveParser {
    block: Regex,
}

impl ImmersiveParser {
    pub fn new() -> Result<Self, PatternError> {
        Ok(Self {
            block: Regex::new(IMMERSIVE_PATTERN)?,
        })
    }

    /// Every immersive block in `response`, in order of appearance.
    pub fn blocks(&self, response: &str) -> Vec<ImmersiveBlock> {
        self.block
            .captures_iter(response)
            .map(|caps| block_from_captures(&caps))
            .collect()
    }

    /// Split a reply into plain-text and immersive segments.
    ///
    /// Whitespace-only text between blocks is dropped.
    pub fn split(&self, response: &str) -> Vec<ResponseSegment> {
        let mut segments = Vec::new();
        let mut cursor = 0;
        for caps in self.block.captures_iter(response) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            push_text(&mut segments, &response[cursor..whole.start()]);
            segments.push(ResponseSegment::Immersive(block_from_captures(&caps)));
            cursor = whole.end();
        }
        push_text(&mut segments, &response[cursor..]);
        segments
    }
}

fn push_text(segments: &mut Vec<ResponseSegment>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        segments.push(ResponseSegment::Text(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REPLY: &str = r#"Here is the script you asked for.
<immersive> id="hello-rs" type="code" title="Hello world">
fn main() {
    println!("hello");
}
</immersive>
Let me know if you need changes."#;

    fn parser() -> ImmersiveParser {
        ImmersiveParser::new().expect("parser")
    }

    #[test]
    fn parses_block_fields() {
        let blocks = parser().blocks(REPLY);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].id, "hello-rs");
        assert_eq!(blocks[0].kind, "code");
        assert_eq!(blocks[0].title, "Hello world");
        assert!(blocks[0].content.starts_with("fn main()"));
        assert!(!blocks[0].content.starts_with('>'));
    }

    #[test]
    fn plain_reply_has_no_blocks() {
        let parser = parser();
        assert!(parser.blocks("just text").is_empty());
        assert_eq!(
            parser.split("just text"),
            vec![ResponseSegment::Text("just text".to_string())]
        );
    }

    #[test]
    fn split_keeps_surrounding_text_in_order() {
        let segments = parser().split(REPLY);
        assert_eq!(segments.len(), 3);
        assert!(matches!(&segments[0], ResponseSegment::Text(text) if text.starts_with("Here is")));
        assert!(matches!(&segments[1], ResponseSegment::Immersive(block) if block.id == "hello-rs"));
        assert!(matches!(&segments[2], ResponseSegment::Text(text) if text.starts_with("Let me know")));
    }
}
