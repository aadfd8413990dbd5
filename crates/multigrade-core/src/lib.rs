//! Multigrade core: prompt templates, output normalization and versioned
//! storage for a content assistant serving classrooms where several grade
//! levels learn together.
//!
//! The pipeline for one request runs
//! [`RequestContext`] → [`bind`] a [`PromptTemplate`] → generation backend →
//! [`Normalizer`] → [`ContentVersioner`] → [`ContentStore`]. The backend call
//! and its retry policy live in `multigrade-orchestrator`; everything else is
//! here.
//!
//! # Example
//!
//! ```rust
//! use multigrade_core::{AgentKind, GradeSet, RequestContext, TemplateRegistry, bind};
//!
//! let context = RequestContext::builder(GradeSet::parse_list("1,2,3").unwrap(), "Science", "Plants")
//!     .duration_minutes(40)
//!     .build()
//!     .unwrap();
//! let registry = TemplateRegistry::builtin();
//! let prompt = bind(registry.lookup(AgentKind::ActivityGenerator), &context).unwrap();
//! assert!(prompt.text.contains("Grade 1, Grade 2, Grade 3"));
//! ```

pub mod agents;
pub mod artifacts;
pub mod config;
pub mod content;
pub mod context;
pub mod error;
pub mod extraction;
pub mod logging;
pub mod prompts;
pub mod storage;

pub use agents::{AgentKind, UnknownAgentKind};
pub use artifacts::{
    ArtifactBody, ArtifactHeader, GeneratedArtifact, NormalizationStatus, Normalized, Normalizer,
    NormalizerConfig, render_markdown,
};
pub use config::{ConfigError, MultigradeConfig, PersistPolicy};
pub use content::{ContentId, ContentPath, ContentVersioner, LineageKey, VersionId, VersionedContent};
pub use context::{ContextError, Grade, GradeSet, RequestContext};
pub use error::{MultigradeError, Result};
pub use extraction::{PlainTextExtractor, Topic, TopicSplitter};
pub use prompts::{BindError, BoundPrompt, PromptTemplate, RegistryError, TemplateRegistry, bind};
pub use storage::{ContentStore, InMemoryContentStore, PutMode, SqliteContentStore, StorageError, open_store};
