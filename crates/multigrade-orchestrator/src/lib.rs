//! Generation client and agent orchestrator for the multigrade assistant.
//!
//! [`GenerationClient`] wraps a backend with the retry, backoff and timeout
//! policy. [`AgentOrchestrator`] sequences the whole pipeline for one request
//! and always returns a terminal [`GenerationOutcome`]; its batch mode walks a
//! split chapter and reports per topic in a [`BatchReport`].

pub mod client;
pub mod error;
pub mod orchestrator;

pub use client::{AttemptState, GenerationClient, GenerationSuccess, RetryPolicy};
pub use error::GenerationError;
pub use orchestrator::{
    AgentOrchestrator, BatchReport, GenerationOutcome, OrchestratorConfig, OutcomeStatus, TopicOutcome,
    TopicResult,
};

use multigrade_core::{
    ContentVersioner, MultigradeConfig, MultigradeError, Normalizer, TemplateRegistry, open_store,
};
use multigrade_models::BackendFactory;
use std::sync::Arc;

/// Builds an orchestrator from configuration: backend, store, template
/// overrides and policies.
///
/// # Errors
///
/// Returns the first backend, store or template error encountered.
pub fn from_config(config: &MultigradeConfig) -> Result<AgentOrchestrator, MultigradeError> {
    let backend = BackendFactory::create(config.backend_config())?;
    let store = open_store(&config.store)?;
    let registry = TemplateRegistry::builtin().with_template_files(&config.template_overrides()?)?;
    let client = GenerationClient::new(backend, RetryPolicy::from(&config.retry), config.generation_parameters());
    Ok(AgentOrchestrator::new(
        Arc::new(registry),
        client,
        Normalizer::new(config.normalizer),
        ContentVersioner::new(store),
        OrchestratorConfig::from(&config.orchestrator),
    ))
}
