//! Content identity, store paths and the content versioner.

mod ids;
mod path;
mod versioned;
mod versioner;

pub use ids::{ContentId, VersionId};
pub use path::{ContentPath, InvalidContentPath, LineageKey, NO_CHAPTER, normalize_segment};
pub use versioned::VersionedContent;
pub use versioner::ContentVersioner;
