//! Ollama backend.
//!
//! This module provides an implementation of `GenerationBackend` for a local
//! Ollama server's `/api/generate` endpoint.

use async_trait::async_trait;
use multigrade_abstraction::{
    BackendError, BackendResponse, BackendUsage, GenerationBackend, GenerationRequest,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::status::{classify_status, classify_transport};

/// Default Ollama server address.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    /// The model ID (e.g., "mistral", "llama3:8b").
    model_id: String,
    /// Identifier reported to logs and stored metadata.
    backend_id: String,
    /// The base URL for the Ollama API.
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl OllamaBackend {
    /// Creates a backend against the default local server.
    #[must_use]
    pub fn new(model_id: String) -> Self {
        Self::with_base_url(model_id, OLLAMA_BASE_URL.to_string())
    }

    /// Creates a backend with a custom base URL (e.g. "http://192.168.1.100:11434").
    #[must_use]
    pub fn with_base_url(model_id: String, base_url: String) -> Self {
        Self {
            backend_id: format!("ollama:{model_id}"),
            model_id,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaError {
    error: String,
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<BackendResponse, BackendError> {
        debug!(
            model_id = %self.model_id,
            prompt_len = request.prompt.len(),
            parameters = ?request.parameters,
            "OllamaBackend generating text"
        );

        let url = format!("{}/api/generate", self.base_url);
        let params = &request.parameters;
        let body = OllamaGenerateRequest {
            model: &self.model_id,
            prompt: &request.prompt,
            stream: false,
            format: params.json_output.then_some("json"),
            options: OllamaOptions {
                temperature: params.temperature,
                top_p: params.top_p,
                num_predict: params.max_output_tokens,
            },
        };

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            error!(error = %e, base_url = %self.base_url, "Failed to connect to Ollama");
            classify_transport("ollama", &self.base_url, &e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Ollama API returned error status");

            if let Ok(error_json) = serde_json::from_str::<OllamaError>(&error_text) {
                if error_json.error.contains("model") && error_json.error.contains("not found") {
                    return Err(BackendError::NonTransient(format!(
                        "Model '{}' not found. Pull it with 'ollama pull {}'.",
                        self.model_id, self.model_id
                    )));
                }
            }
            return Err(classify_status("ollama", status, &error_text));
        }

        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Ollama API response");
            BackendError::Transient(format!("Failed to parse Ollama response: {e}"))
        })?;

        let prompt_tokens = ollama_response.prompt_eval_count.unwrap_or(0);
        let completion_tokens = ollama_response.eval_count.unwrap_or(0);

        Ok(BackendResponse {
            text: ollama_response.response,
            model_id: Some(self.model_id.clone()),
            usage: Some(BackendUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        })
    }

    fn backend_id(&self) -> &str {
        &self.backend_id
    }
}
