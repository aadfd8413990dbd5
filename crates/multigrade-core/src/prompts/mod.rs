//! Prompt templates, the template registry and the prompt binder.

mod binder;
mod builtin;
mod registry;
mod templates;

pub use binder::{BoundPrompt, REPAIR_REQUEST, bind};
pub use registry::TemplateRegistry;
pub use templates::{PromptTemplate, TemplateDefault};

use thiserror::Error;

use crate::agents::AgentKind;

/// Errors raised while building or overriding the template registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// An override omits a placeholder the kind's schema depends on.
    #[error("template for {kind} is missing required placeholder {{{{{placeholder}}}}}")]
    MissingPlaceholder { kind: AgentKind, placeholder: String },

    /// An override was built for a different kind.
    #[error("template for {found} cannot replace the {expected} template")]
    KindMismatch { expected: AgentKind, found: AgentKind },

    /// A template file could not be read or parsed.
    #[error("failed to load template from {path}: {reason}")]
    Load { path: String, reason: String },
}

/// Errors raised while binding a template to a request context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    /// A placeholder has no context field, classroom parameter or default.
    #[error("{kind} template placeholder '{field}' has no value and no default")]
    MissingField { kind: AgentKind, field: String },

    /// Rendering the prompt text failed.
    #[error("failed to render prompt: {0}")]
    Render(String),
}
