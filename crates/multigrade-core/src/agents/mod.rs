//! Agent kinds.
//!
//! An agent is a named content-generation role with its own prompt template
//! and expected output schema. The set of agents is fixed.

mod kind;

pub use kind::{AgentKind, UnknownAgentKind};
