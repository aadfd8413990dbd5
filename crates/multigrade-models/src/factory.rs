//! Backend factory for creating backend instances from configuration.
//!
//! This module provides functionality to create backends based on configuration,
//! handling API key loading from environment variables.

use crate::{GeminiBackend, MockBackend, OllamaBackend};
use multigrade_abstraction::{BackendError, GenerationBackend};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error};

/// Backend type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Scripted mock backend.
    Mock,
    /// Google Gemini.
    Gemini,
    /// Local Ollama server.
    Ollama,
}

impl FromStr for BackendType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "gemini" | "google" => Ok(Self::Gemini),
            "ollama" | "local" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mock => "mock",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        };
        f.write_str(name)
    }
}

/// Backend configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// The type of backend to create.
    pub backend_type: BackendType,
    /// The model ID (e.g., "gemini-2.0-flash", "mistral").
    pub model_id: String,
    /// Optional API key (if not provided, will be loaded from environment).
    pub api_key: Option<String>,
    /// Optional base URL override.
    pub base_url: Option<String>,
}

impl BackendConfig {
    /// Creates a new `BackendConfig` with the given type and model ID.
    #[must_use]
    pub fn new(backend_type: BackendType, model_id: impl Into<String>) -> Self {
        Self { backend_type, model_id: model_id.into(), api_key: None, base_url: None }
    }

    /// Sets the API key for this configuration.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the base URL for this configuration.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Factory for creating backend instances.
pub struct BackendFactory;

impl BackendFactory {
    /// Creates a backend from the given configuration.
    ///
    /// # Errors
    /// Returns `BackendError::NonTransient` if creation fails (e.g., missing API key).
    pub fn create(config: BackendConfig) -> Result<Arc<dyn GenerationBackend>, BackendError> {
        debug!(
            backend_type = %config.backend_type,
            model_id = %config.model_id,
            "Creating generation backend"
        );

        match config.backend_type {
            BackendType::Mock => Ok(Arc::new(MockBackend::new(format!("mock:{}", config.model_id)))),
            BackendType::Gemini => {
                let backend = match (config.api_key, config.base_url) {
                    (Some(key), Some(url)) => GeminiBackend::with_base_url(config.model_id, key, url),
                    (Some(key), None) => GeminiBackend::with_api_key(config.model_id, key),
                    (None, _) => GeminiBackend::new(config.model_id)?,
                };
                Ok(Arc::new(backend))
            }
            BackendType::Ollama => {
                let backend = match config.base_url {
                    Some(url) => OllamaBackend::with_base_url(config.model_id, url),
                    None => OllamaBackend::new(config.model_id),
                };
                Ok(Arc::new(backend))
            }
        }
    }

    /// Creates a backend from a type string and model ID.
    ///
    /// # Errors
    /// Returns an error if the type is unrecognized or creation fails.
    pub fn create_from_str(
        backend_type: &str,
        model_id: impl Into<String>,
    ) -> Result<Arc<dyn GenerationBackend>, BackendError> {
        let parsed = BackendType::from_str(backend_type).map_err(|()| {
            error!(backend_type = %backend_type, "Unrecognized backend type");
            BackendError::NonTransient(format!("Unrecognized backend type: {backend_type}"))
        })?;
        Self::create(BackendConfig::new(parsed, model_id))
    }
}
