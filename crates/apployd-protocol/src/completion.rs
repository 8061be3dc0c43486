use crate::error::CompletionError;
use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Stream of text deltas produced by a streaming completion.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

/// Speaker of a single turn sent to the completion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// Turn authored by the user.
    User,
    /// Turn authored by the model.
    Model,
}

/// One turn of conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Speaker of the turn.
    pub role: TurnRole,
    /// Turn text.
    pub text: String,
}

impl Turn {
    /// Build a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    /// Build a model turn.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

/// Fixed decoding parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: None,
        }
    }
}

/// Harm category covered by a safety setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

/// Blocking threshold for a harm category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

/// Static content-safety configuration entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/// Safety settings applied when none are configured.
pub fn default_safety_settings() -> Vec<SafetySetting> {
    [
        HarmCategory::Harassment,
        HarmCategory::HateSpeech,
        HarmCategory::SexuallyExplicit,
        HarmCategory::DangerousContent,
    ]
    .into_iter()
    .map(|category| SafetySetting {
        category,
        threshold: HarmBlockThreshold::BlockMediumAndAbove,
    })
    .collect()
}

/// Outbound completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Ordered turns; the last one is the message being answered.
    pub turns: Vec<Turn>,
    /// Decoding parameters.
    pub generation: GenerationConfig,
    /// Content-safety configuration.
    pub safety_settings: Vec<SafetySetting>,
}

impl CompletionRequest {
    /// Build a request with default decoding and safety parameters.
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns,
            generation: GenerationConfig::default(),
            safety_settings: default_safety_settings(),
        }
    }

    /// Replace the decoding parameters.
    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// Replace the safety settings.
    pub fn with_safety_settings(mut self, safety_settings: Vec<SafetySetting>) -> Self {
        self.safety_settings = safety_settings;
        self
    }

    /// Text of the final user turn, if the request ends with one.
    pub fn last_user_text(&self) -> Option<&str> {
        self.turns
            .last()
            .filter(|turn| turn.role == TurnRole::User)
            .map(|turn| turn.text.as_str())
    }
}

/// Completion service abstraction used by the chat engine.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a full reply for the request.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;

    /// Generate a reply as a stream of text deltas.
    ///
    /// Providers without native streaming yield the full reply as one delta.
    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionStream, CompletionError> {
        let text = self.complete(request).await?;
        Ok(Box::pin(futures_util::stream::once(async move { Ok(text) })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl CompletionProvider for Echo {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
            Ok(request.last_user_text().unwrap_or_default().to_string())
        }
    }

    #[test]
    fn generation_config_serializes_camel_case() {
        let value = serde_json::to_value(GenerationConfig::default()).expect("json");
        assert_eq!(value["topK"], json!(64));
        assert!(value.get("topP").is_some());
        assert!(value.get("temperature").is_some());
        assert!(value.get("maxOutputTokens").is_none());
    }

    #[test]
    fn safety_settings_use_wire_names() {
        let value = serde_json::to_value(default_safety_settings()).expect("json");
        assert_eq!(value[0]["category"], json!("HARM_CATEGORY_HARASSMENT"));
        assert_eq!(value[3]["category"], json!("HARM_CATEGORY_DANGEROUS_CONTENT"));
        assert_eq!(value[0]["threshold"], json!("BLOCK_MEDIUM_AND_ABOVE"));
    }

    #[test]
    fn last_user_text_ignores_trailing_model_turn() {
        let request = CompletionRequest::new(vec![Turn::user("hi"), Turn::model("hello")]);
        assert_eq!(request.last_user_text(), None);
        let request = CompletionRequest::new(vec![Turn::user("hi")]);
        assert_eq!(request.last_user_text(), Some("hi"));
    }

    #[tokio::test]
    async fn default_stream_yields_single_delta() {
        let request = CompletionRequest::new(vec![Turn::user("ping")]);
        let chunks: Vec<_> = Echo
            .complete_stream(&request)
            .await
            .expect("stream")
            .collect()
            .await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_deref().expect("chunk"), "ping");
    }
}
