//! Error types for completion services.

use thiserror::Error;

/// Errors returned by completion providers.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// No API key was available for the provider.
    #[error("API key is missing (set {0})")]
    MissingApiKey(String),
    /// The request never reached the service or the connection failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// The service answered with a non-success status.
    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },
    /// The service refused to answer because of its safety configuration.
    #[error("response blocked: {0}")]
    Blocked(String),
    /// The service answered without any text.
    #[error("empty response from completion service")]
    EmptyResponse,
    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A reply pattern table failed to compile.
#[derive(Debug, Error)]
#[error("invalid reply pattern: {0}")]
pub struct PatternError(String);

impl From<regex::Error> for PatternError {
    fn from(err: regex::Error) -> Self {
        PatternError(err.to_string())
    }
}

impl CompletionError {
    /// Rewrite the error into a message suitable for showing inline in a chat.
    ///
    /// Classification is by substring over the rendered error, since upstream
    /// services report the interesting part (status names, quota hints) in
    /// free-form message text.
    pub fn user_message(&self) -> String {
        if let CompletionError::MissingApiKey(var) = self {
            return format!("No API key is configured. Set {var} and try again.");
        }
        if let CompletionError::Blocked(_) = self {
            return "The response was blocked by the content-safety filter. Try rephrasing your message.".to_string();
        }

        let rendered = self.to_string();
        if rendered.contains("PERMISSION_DENIED") {
            "The API key does not have permission to use this model. Please check your API key permissions.".to_string()
        } else if rendered.contains("API_KEY_INVALID") || rendered.contains("API key not valid") {
            "The API key is invalid. Please check your configuration.".to_string()
        } else if rendered.contains("RESOURCE_EXHAUSTED") || rendered.contains("quota") {
            "API quota exceeded. Please try again later.".to_string()
        } else if rendered.contains("INVALID_ARGUMENT") {
            "The request was rejected as invalid. Try a shorter or simpler message.".to_string()
        } else {
            "Sorry, I couldn't reach the assistant right now. Please try again.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CompletionError;
    use pretty_assertions::assert_eq;

    fn upstream(status: u16, message: &str) -> CompletionError {
        CompletionError::Upstream {
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn classifies_quota_errors() {
        let err = upstream(429, "RESOURCE_EXHAUSTED: quota exceeded for project");
        assert_eq!(err.user_message(), "API quota exceeded. Please try again later.");
    }

    #[test]
    fn classifies_permission_errors() {
        let err = upstream(403, "PERMISSION_DENIED");
        assert!(err.user_message().contains("permission"));
    }

    #[test]
    fn classifies_invalid_key_before_invalid_argument() {
        let err = upstream(400, "INVALID_ARGUMENT: API key not valid. Please pass a valid API key.");
        assert_eq!(
            err.user_message(),
            "The API key is invalid. Please check your configuration."
        );
    }

    #[test]
    fn missing_key_names_the_variable() {
        let err = CompletionError::MissingApiKey("GEMINI_API_KEY".to_string());
        assert!(err.user_message().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn unknown_errors_fall_back_to_generic_message() {
        let err = CompletionError::Transport("connection reset".to_string());
        assert!(err.user_message().starts_with("Sorry"));
    }
}
