//! Google Gemini backend.
//!
//! This module provides an implementation of `GenerationBackend` for the
//! Gemini `generateContent` REST endpoint.

use async_trait::async_trait;
use multigrade_abstraction::{
    BackendError, BackendResponse, BackendUsage, GenerationBackend, GenerationRequest,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, error};

use crate::status::{classify_status, classify_transport};

/// Default Gemini API root.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini backend.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    /// The model ID (e.g., "gemini-2.0-flash").
    model_id: String,
    /// Identifier reported to logs and stored metadata.
    backend_id: String,
    /// The API key for authentication.
    api_key: String,
    /// The base URL for the Gemini API.
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl GeminiBackend {
    /// Creates a backend reading the key from `GEMINI_API_KEY`.
    ///
    /// # Errors
    /// Returns `BackendError::NonTransient` if the variable is not set.
    pub fn new(model_id: String) -> Result<Self, BackendError> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| {
            BackendError::NonTransient("GEMINI_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::with_api_key(model_id, api_key))
    }

    /// Creates a backend with an explicit API key.
    #[must_use]
    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self::with_base_url(model_id, api_key, GEMINI_BASE_URL.to_string())
    }

    /// Creates a backend against a custom API root (proxies, tests).
    #[must_use]
    pub fn with_base_url(model_id: String, api_key: String, base_url: String) -> Self {
        Self {
            backend_id: format!("gemini:{model_id}"),
            model_id,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn build_request(request: &GenerationRequest) -> GeminiRequest {
        let params = &request.parameters;
        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart { text: request.prompt.clone() }],
            }],
            generation_config: Some(GeminiGenerationConfig {
                temperature: params.temperature,
                top_p: params.top_p,
                max_output_tokens: params.max_output_tokens,
                response_mime_type: params.json_output.then(|| "application/json".to_string()),
            }),
        }
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<BackendResponse, BackendError> {
        debug!(
            model_id = %self.model_id,
            prompt_len = request.prompt.len(),
            parameters = ?request.parameters,
            "GeminiBackend generating text"
        );

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model_id);
        let body = Self::build_request(request);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send request to Gemini API");
                classify_transport("gemini", &self.base_url, &e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Gemini API returned error status");
            return Err(classify_status("gemini", status, &error_text));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Gemini API response");
            BackendError::Transient(format!("Failed to parse Gemini response: {e}"))
        })?;

        let candidate = gemini_response.candidates.first().ok_or_else(|| {
            let reason = gemini_response
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.clone())
                .unwrap_or_else(|| "no candidates returned".to_string());
            error!(reason = %reason, "Gemini API returned no candidates");
            BackendError::NonTransient(format!("Gemini returned no content: {reason}"))
        })?;

        // Long completions may be split over several parts.
        let text: String = candidate
            .content
            .as_ref()
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        let usage = gemini_response.usage_metadata.map(|meta| BackendUsage {
            prompt_tokens: meta.prompt_token_count.unwrap_or(0),
            completion_tokens: meta.candidates_token_count.unwrap_or(0),
            total_tokens: meta.total_token_count.unwrap_or(0),
        });

        Ok(BackendResponse { text, model_id: Some(self.model_id.clone()), usage })
    }

    fn backend_id(&self) -> &str {
        &self.backend_id
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}
