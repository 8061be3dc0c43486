//! Capture policy controlling which write-side analyzers run.

/// Policy for deciding what to capture from each message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturePolicy {
    /// Run the fact extractor over user messages.
    pub extract_facts: bool,
    /// Run the context tracker over user messages.
    pub track_context: bool,
    /// Run the consistency tracker over assistant replies.
    pub track_consistency: bool,
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            extract_facts: true,
            track_context: true,
            track_consistency: true,
        }
    }
}

impl CapturePolicy {
    /// Record transcripts only; no analysis.
    pub fn transcript_only() -> Self {
        Self {
            extract_facts: false,
            track_context: false,
            track_consistency: false,
        }
    }
}
