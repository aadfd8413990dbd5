//! Generation backend implementations.
//!
//! This crate provides concrete implementations of the `GenerationBackend` trait.
//!
//! # Supported Providers
//!
//! - **Mock**: Scripted replies for testing and offline demos
//! - **Gemini**: Google's Gemini models (API key required)
//! - **Ollama**: Local models via Ollama (no API key, local execution)

pub mod factory;
pub mod gemini;
pub mod ollama;
mod status;

use async_trait::async_trait;
use multigrade_abstraction::{
    BackendError, BackendResponse, BackendUsage, GenerationBackend, GenerationRequest,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

pub use factory::{BackendConfig, BackendFactory, BackendType};
pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;

/// One scripted reply of a [`MockBackend`].
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this text.
    Text(String),
    /// Fail with this error.
    Error(BackendError),
    /// Wait, then produce the inner reply.
    Delayed(Duration, Box<MockReply>),
}

/// A scripted implementation of `GenerationBackend` for tests and demos.
///
/// Replies are consumed in order. Once the script runs dry the backend keeps
/// answering with the fallback reply (by default an echo of the prompt).
#[derive(Debug)]
pub struct MockBackend {
    id: String,
    script: Mutex<VecDeque<MockReply>>,
    fallback: Option<MockReply>,
    prompts: Mutex<Vec<String>>,
}

impl MockBackend {
    /// Creates a mock that echoes prompts back.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Appends a reply to the script.
    #[must_use]
    pub fn with_reply(self, reply: MockReply) -> Self {
        self.push(reply);
        self
    }

    /// Appends a text reply to the script.
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_reply(MockReply::Text(text.into()))
    }

    /// Appends an error reply to the script.
    #[must_use]
    pub fn with_error(self, error: BackendError) -> Self {
        self.with_reply(MockReply::Error(error))
    }

    /// Sets the reply used once the script is exhausted.
    #[must_use]
    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Appends a reply at runtime.
    pub fn push(&self, reply: MockReply) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(reply);
        }
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn next_reply(&self, prompt: &str) -> MockReply {
        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        scripted
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| MockReply::Text(format!("Mock response for: {prompt}")))
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<BackendResponse, BackendError> {
        debug!(backend_id = %self.id, prompt_len = request.prompt.len(), "MockBackend generating text");

        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }

        let mut reply = self.next_reply(&request.prompt);
        loop {
            match reply {
                MockReply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
                MockReply::Error(err) => return Err(err),
                MockReply::Text(text) => {
                    let prompt_tokens = count_tokens(&request.prompt);
                    let completion_tokens = count_tokens(&text);
                    return Ok(BackendResponse {
                        text,
                        model_id: Some(self.id.clone()),
                        usage: Some(BackendUsage {
                            prompt_tokens,
                            completion_tokens,
                            total_tokens: prompt_tokens + completion_tokens,
                        }),
                    });
                }
            }
        }
    }

    fn backend_id(&self) -> &str {
        &self.id
    }
}

/// Count tokens in a string (simplified: word count).
fn count_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use multigrade_abstraction::GenerationParameters;

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest::new(prompt, GenerationParameters::default())
    }

    #[tokio::test]
    async fn test_mock_echoes_by_default() {
        let backend = MockBackend::new("mock");
        let response = backend.generate(&request("hello there")).await.unwrap();
        assert_eq!(response.text, "Mock response for: hello there");
        assert_eq!(response.usage.unwrap().prompt_tokens, 2);
    }

    #[tokio::test]
    async fn test_mock_script_order_then_fallback() {
        let backend = MockBackend::new("mock")
            .with_error(BackendError::Transient("busy".to_string()))
            .with_text("second")
            .with_fallback(MockReply::Text("again".to_string()));

        assert!(backend.generate(&request("a")).await.is_err());
        assert_eq!(backend.generate(&request("b")).await.unwrap().text, "second");
        assert_eq!(backend.generate(&request("c")).await.unwrap().text, "again");
        assert_eq!(backend.call_count(), 3);
        assert_eq!(backend.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_delayed_reply() {
        let backend = MockBackend::new("mock").with_reply(MockReply::Delayed(
            Duration::from_secs(5),
            Box::new(MockReply::Text("late".to_string())),
        ));
        let started = tokio::time::Instant::now();
        let response = backend.generate(&request("x")).await.unwrap();
        assert_eq!(response.text, "late");
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
