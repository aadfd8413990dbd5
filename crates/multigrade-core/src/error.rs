//! Error types for the multigrade core.

use multigrade_abstraction::{BackendError, ExtractionError};
use thiserror::Error;

use crate::agents::UnknownAgentKind;
use crate::config::ConfigError;
use crate::context::ContextError;
use crate::prompts::{BindError, RegistryError};
use crate::storage::StorageError;

/// Umbrella error for callers that drive several stages.
#[derive(Error, Debug)]
pub enum MultigradeError {
    /// Invalid request context
    #[error("Invalid request: {0}")]
    Context(#[from] ContextError),

    #[error("Unknown agent kind: {0}")]
    AgentKind(#[from] UnknownAgentKind),

    /// Template registry errors
    #[error("Template error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Prompt binding error: {0}")]
    Bind(#[from] BindError),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Backend construction errors
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for multigrade operations.
pub type Result<T> = std::result::Result<T, MultigradeError>;
