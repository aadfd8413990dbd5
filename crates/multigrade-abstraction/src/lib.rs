//! Collaborator contracts for the multigrade content assistant.
//!
//! This crate defines the traits and types the core pipeline consumes without
//! knowing who implements them: the generation backend (a text-completion
//! service) and the document text extractor used for uploaded chapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error reported by a generation backend.
///
/// Backends classify every failure into one of three buckets so callers can
/// decide whether a retry makes sense without inspecting provider details.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendError {
    /// Rate limiting, overload or a dropped connection. Worth retrying.
    #[error("Transient backend error: {0}")]
    Transient(String),

    /// Malformed request, authentication failure, unknown model. Retrying
    /// the same request will fail the same way.
    #[error("Backend rejected request: {0}")]
    NonTransient(String),

    /// The backend (or the transport) gave up waiting for a completion.
    #[error("Backend timed out: {0}")]
    Timeout(String),
}

impl BackendError {
    /// Returns true if the failed request may succeed when sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }

    /// Returns the human-readable message without the classification prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Transient(m) | Self::NonTransient(m) | Self::Timeout(m) => m,
        }
    }
}

/// Parameters for controlling generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    /// Sampling temperature (creativity/randomness), between 0 and 2.
    pub temperature: Option<f32>,

    /// Nucleus sampling probability mass.
    pub top_p: Option<f32>,

    /// Truncation bound on the generated output, in tokens.
    pub max_output_tokens: Option<u32>,

    /// Ask the backend for a JSON payload when it supports a response mime type.
    #[serde(default)]
    pub json_output: bool,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self { temperature: Some(0.7), top_p: None, max_output_tokens: Some(2048), json_output: true }
    }
}

/// A single request sent to a generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The fully bound prompt text.
    pub prompt: String,
    /// Generation parameters for this request.
    pub parameters: GenerationParameters,
}

impl GenerationRequest {
    /// Creates a request with the given prompt and parameters.
    pub fn new(prompt: impl Into<String>, parameters: GenerationParameters) -> Self {
        Self { prompt: prompt.into(), parameters }
    }
}

/// Token accounting reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BackendUsage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: u32,
    /// Number of tokens in the completion.
    pub completion_tokens: u32,
    /// Total number of tokens used.
    pub total_tokens: u32,
}

/// The response from a generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    /// The generated text (prose or a structured payload as text).
    pub text: String,
    /// The model that produced the text, if the backend reports it.
    pub model_id: Option<String>,
    /// Usage statistics, if available.
    pub usage: Option<BackendUsage>,
}

/// A text-completion service.
///
/// Implementations must be `Send + Sync`: the host application may run many
/// generation requests concurrently against one backend instance.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Sends one request and waits for the completion.
    ///
    /// # Errors
    /// Returns a classified `BackendError` if the backend fails.
    async fn generate(&self, request: &GenerationRequest) -> Result<BackendResponse, BackendError>;

    /// Returns an identifier for logs and stored metadata (e.g. `gemini:gemini-2.0-flash`).
    fn backend_id(&self) -> &str;
}

/// Errors produced when turning an uploaded document into text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The document holds no extractable text (e.g. a scanned image).
    #[error("document '{name}' is not text-derivable: {reason}")]
    NotTextDerivable {
        /// Document name as supplied by the caller.
        name: String,
        /// Why extraction was impossible.
        reason: String,
    },

    /// The document could not be read at all.
    #[error("failed to read document '{name}': {reason}")]
    Unreadable {
        /// Document name as supplied by the caller.
        name: String,
        /// Underlying cause.
        reason: String,
    },
}

/// An uploaded document handed to an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHandle {
    /// File name or other caller-facing label.
    pub name: String,
    /// Raw document bytes.
    pub bytes: Vec<u8>,
}

impl DocumentHandle {
    /// Creates a handle from a name and the raw bytes.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }
}

/// Produces plain text from an uploaded document.
pub trait TextExtractor: Send + Sync {
    /// Extracts the document's text.
    ///
    /// # Errors
    /// Returns `ExtractionError` when the document yields no text.
    fn extract(&self, document: &DocumentHandle) -> Result<String, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(BackendError::Transient("429".to_string()).is_retryable());
        assert!(BackendError::Timeout("deadline".to_string()).is_retryable());
        assert!(!BackendError::NonTransient("401".to_string()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = BackendError::NonTransient("invalid api key".to_string());
        assert_eq!(err.to_string(), "Backend rejected request: invalid api key");
        assert_eq!(err.message(), "invalid api key");
    }

    #[test]
    fn test_default_parameters() {
        let params = GenerationParameters::default();
        assert_eq!(params.temperature, Some(0.7));
        assert_eq!(params.max_output_tokens, Some(2048));
        assert!(params.json_output);
    }

    #[test]
    fn test_extraction_error_display() {
        let err = ExtractionError::NotTextDerivable {
            name: "scan.pdf".to_string(),
            reason: "no text layer".to_string(),
        };
        assert_eq!(err.to_string(), "document 'scan.pdf' is not text-derivable: no text layer");
    }

    #[test]
    fn test_parameters_json_output_defaults_off_when_absent() {
        let params: GenerationParameters =
            serde_json::from_str(r#"{"temperature": 0.2, "top_p": null, "max_output_tokens": 512}"#).unwrap();
        assert_eq!(params.max_output_tokens, Some(512));
        assert!(!params.json_output);
    }
}
