use serde::{Deserialize, Serialize};

use super::ids::{ContentId, VersionId};
use super::path::{ContentPath, LineageKey};
use crate::artifacts::GeneratedArtifact;

/// An artifact with its place in a lineage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedContent {
    pub content_id: ContentId,
    pub version_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_version_id: Option<VersionId>,
    pub artifact: GeneratedArtifact,
}

impl VersionedContent {
    pub const fn version_id(&self) -> VersionId {
        VersionId::new(self.content_id, self.version_number)
    }

    pub fn lineage(&self) -> LineageKey {
        LineageKey::for_artifact(&self.artifact.header, self.content_id)
    }

    /// Where this version lives in the store.
    pub fn path(&self) -> ContentPath {
        self.lineage().at(self.version_number)
    }
}
