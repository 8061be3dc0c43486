use apployd_protocol::{CompletionError, CompletionProvider, CompletionRequest, CompletionStream};
use async_trait::async_trait;
use futures_util::stream;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FixedCompletion {
    response: String,
}

impl FixedCompletion {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl CompletionProvider for FixedCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
        Ok(self.response.clone())
    }
}

/// Replies with a fixed text and keeps every request it was sent.
#[derive(Debug, Clone)]
pub struct RecordingCompletion {
    response: String,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl RecordingCompletion {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl CompletionProvider for RecordingCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.requests.lock().push(request.clone());
        Ok(self.response.clone())
    }
}

#[derive(Debug, Clone)]
pub struct StreamingCompletion {
    chunks: Vec<String>,
}

impl StreamingCompletion {
    pub fn new(chunks: Vec<String>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl CompletionProvider for StreamingCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
        Ok(self.chunks.concat())
    }

    async fn complete_stream(
        &self,
        _request: &CompletionRequest,
    ) -> Result<CompletionStream, CompletionError> {
        let chunks = self.chunks.iter().cloned().map(Ok).collect::<Vec<_>>();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// Fails every request with an upstream error carrying `message`.
#[derive(Debug, Clone)]
pub struct FailingCompletion {
    status: u16,
    message: String,
}

impl FailingCompletion {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: 500,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

#[async_trait]
impl CompletionProvider for FailingCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
        Err(CompletionError::Upstream {
            status: self.status,
            message: self.message.clone(),
        })
    }
}
