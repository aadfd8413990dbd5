//! Generated artifacts: per-kind schemas, normalization and rendering.

pub mod bodies;
mod lenient;
mod markdown;
mod model;
mod normalizer;
mod schema;

pub use markdown::render_markdown;
pub use model::{ArtifactBody, ArtifactHeader, GeneratedArtifact};
pub use normalizer::{NormalizationStatus, Normalized, Normalizer, NormalizerConfig};
pub use schema::{ArtifactSchema, FieldPath};
