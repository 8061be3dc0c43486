//! Gemini `generateContent` provider over HTTP.

use apployd_config::CompletionConfig;
use apployd_protocol::{
    CompletionError, CompletionProvider, CompletionRequest, CompletionStream, GenerationConfig,
    SafetySetting, Turn, TurnRole,
};
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const API_VERSION: &str = "v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";
const SAFETY_FINISH_REASON: &str = "SAFETY";

/// Completion provider for the Gemini API.
#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Build a provider from config, reading the key from `api_key_env`.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| CompletionError::MissingApiKey(config.api_key_env.clone()))?;
        Ok(Self::new(&config.base_url, &config.model, api_key))
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/{API_VERSION}/models/{}:{method}",
            self.base_url, self.model
        )
    }

    async fn post(
        &self,
        url: &str,
        request: &CompletionRequest,
    ) -> Result<reqwest::Response, CompletionError> {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&GenerateContentBody::from_request(request))
            .send()
            .await
            .map_err(|err| CompletionError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .map_err(|err| CompletionError::Transport(err.to_string()))?;
        Err(upstream_error(status.as_u16(), &body))
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = self.endpoint("generateContent");
        debug!(
            "gemini request (model={}, turns={})",
            self.model,
            request.turns.len()
        );
        let body = self
            .post(&url, request)
            .await?
            .text()
            .await
            .map_err(|err| CompletionError::Transport(err.to_string()))?;
        let response: GenerateContentResponse = serde_json::from_str(&body)?;
        let text = response_text(&response)?;
        if text.is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(text)
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionStream, CompletionError> {
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        debug!(
            "gemini stream request (model={}, turns={})",
            self.model,
            request.turns.len()
        );
        let response = self.post(&url, request).await?;
        let chunks = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|err| CompletionError::Transport(err.to_string()))
            })
            .boxed();
        Ok(sse_deltas(chunks))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    contents: Vec<Content>,
    generation_config: &'a GenerationConfig,
    safety_settings: &'a [SafetySetting],
}

impl<'a> GenerateContentBody<'a> {
    fn from_request(request: &'a CompletionRequest) -> Self {
        Self {
            contents: request.turns.iter().map(Content::from_turn).collect(),
            generation_config: &request.generation,
            safety_settings: &request.safety_settings,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn from_turn(turn: &Turn) -> Self {
        let role = match turn.role {
            TurnRole::User => "user",
            TurnRole::Model => "model",
        };
        Self {
            role: Some(role.to_string()),
            parts: vec![Part {
                text: Some(turn.text.clone()),
            }],
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Text of the first candidate; a blocked prompt or safety stop is an error.
fn response_text(response: &GenerateContentResponse) -> Result<String, CompletionError> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return Err(CompletionError::Blocked(reason.to_string()));
    }
    let Some(candidate) = response.candidates.first() else {
        return Ok(String::new());
    };
    let text: String = candidate
        .content
        .iter()
        .flat_map(|content| content.parts.iter())
        .filter_map(|part| part.text.as_deref())
        .collect();
    if text.is_empty() && candidate.finish_reason.as_deref() == Some(SAFETY_FINISH_REASON) {
        return Err(CompletionError::Blocked(SAFETY_FINISH_REASON.to_string()));
    }
    Ok(text)
}

/// Map a non-success response into an upstream error, keeping the API status name.
fn upstream_error(status: u16, body: &str) -> CompletionError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(name) => format!("{name}: {}", envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => body.trim().to_string(),
    };
    warn!("gemini request failed (status={status})");
    CompletionError::Upstream { status, message }
}

/// Decode one SSE line into a text delta. Non-data lines and empty deltas yield `None`.
fn parse_sse_line(line: &str) -> Option<Result<String, CompletionError>> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() {
        return None;
    }
    let decoded = serde_json::from_str::<GenerateContentResponse>(payload)
        .map_err(CompletionError::from)
        .and_then(|response| response_text(&response));
    match decoded {
        Ok(text) if text.is_empty() => None,
        other => Some(other),
    }
}

struct SseState {
    chunks: BoxStream<'static, Result<Vec<u8>, CompletionError>>,
    buffer: Vec<u8>,
    pending: VecDeque<Result<String, CompletionError>>,
    finished: bool,
}

impl SseState {
    /// Move every complete line in the buffer into `pending`.
    fn drain_lines(&mut self) {
        while let Some(end) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(delta) = parse_sse_line(line.trim_end()) {
                self.pending.push_back(delta);
            }
        }
    }
}

/// Turn a byte stream of SSE events into text deltas.
fn sse_deltas(chunks: BoxStream<'static, Result<Vec<u8>, CompletionError>>) -> CompletionStream {
    let state = SseState {
        chunks,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };
    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.chunks.next().await {
                Some(Ok(bytes)) => {
                    state.buffer.extend_from_slice(&bytes);
                    state.drain_lines();
                }
                Some(Err(err)) => {
                    state.finished = true;
                    state.pending.push_back(Err(err));
                }
                None => {
                    state.finished = true;
                    state.buffer.push(b'\n');
                    state.drain_lines();
                }
            }
        }
    }))
}
