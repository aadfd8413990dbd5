use std::sync::Arc;
use tracing::{debug, info};

use super::ids::{ContentId, VersionId};
use super::path::{ContentPath, LineageKey};
use super::versioned::VersionedContent;
use crate::artifacts::{ArtifactHeader, GeneratedArtifact};
use crate::storage::{ContentStore, PutMode, StorageResult};

/// Assigns identity and version numbers to artifacts.
///
/// `version` only reads the store. Writing is a separate `commit` so the
/// caller decides when the single durable side effect happens.
#[derive(Clone)]
pub struct ContentVersioner {
    store: Arc<dyn ContentStore>,
}

impl ContentVersioner {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Wraps `artifact` as the next version of `prior`, or as version 1 of a
    /// freshly minted id.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`](crate::storage::StorageError) if the
    /// lineage lookup fails.
    pub async fn version(
        &self,
        artifact: GeneratedArtifact,
        prior: Option<ContentId>,
    ) -> StorageResult<VersionedContent> {
        let Some(content_id) = prior else {
            let content_id = ContentId::new();
            debug!(content_id = %content_id, "Minted new content id");
            return Ok(VersionedContent {
                content_id,
                version_number: 1,
                parent_version_id: None,
                artifact,
            });
        };

        let lineage = LineageKey::for_artifact(&artifact.header, content_id);
        let latest = self.store.list_versions(&lineage).await?.last().copied();
        let version_number = latest.map_or(1, |v| v + 1);
        debug!(lineage = %lineage, version = version_number, "Assigned next version");
        Ok(VersionedContent {
            content_id,
            version_number,
            parent_version_id: latest.map(|v| VersionId::new(content_id, v)),
            artifact,
        })
    }

    /// Writes `content` into its slot, refusing to overwrite.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`](crate::storage::StorageError::Conflict)
    /// if another writer already took the slot.
    pub async fn commit(&self, content: &VersionedContent) -> StorageResult<ContentPath> {
        let path = content.path();
        self.store.put(&path, content, PutMode::CreateOnly).await?;
        info!(path = %path, "Committed content version");
        Ok(path)
    }

    /// Stored lineages for the subject, chapter, topic and agent kind of
    /// `header`, whatever their content id.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the listing fails.
    pub async fn existing_lineages(&self, header: &ArtifactHeader) -> StorageResult<Vec<LineageKey>> {
        let wanted = LineageKey::for_artifact(header, ContentId::new());
        let lineages = self.store.list_lineages(Some(&header.subject)).await?;
        Ok(lineages.into_iter().filter(|lineage| lineage.same_topic(&wanted)).collect())
    }

    /// All stored versions of `lineage`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if any read fails.
    pub async fn history(&self, lineage: &LineageKey) -> StorageResult<Vec<VersionedContent>> {
        let mut versions = Vec::new();
        for version in self.store.list_versions(lineage).await? {
            versions.push(self.store.get(&lineage.at(version)).await?);
        }
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentKind;
    use crate::artifacts::{ArtifactBody, ArtifactHeader};
    use crate::context::{GradeSet, RequestContext};
    use crate::storage::{InMemoryContentStore, StorageError};

    fn artifact() -> GeneratedArtifact {
        let ctx = RequestContext::builder(GradeSet::parse_list("1,2").unwrap(), "Mathematics", "Addition")
            .build()
            .unwrap();
        GeneratedArtifact::new(
            ArtifactHeader::from_context(AgentKind::WorksheetGenerator, &ctx),
            ArtifactBody::Unstructured { raw_text: "draft".into(), partial_json: None },
        )
    }

    fn versioner() -> ContentVersioner {
        ContentVersioner::new(Arc::new(InMemoryContentStore::new()))
    }

    #[tokio::test]
    async fn test_without_prior_always_mints_version_one() {
        let versioner = versioner();
        let a = versioner.version(artifact(), None).await.unwrap();
        versioner.commit(&a).await.unwrap();
        let b = versioner.version(artifact(), None).await.unwrap();
        assert_eq!(a.version_number, 1);
        assert_eq!(b.version_number, 1);
        assert_ne!(a.content_id, b.content_id);
        assert!(a.parent_version_id.is_none());
    }

    #[tokio::test]
    async fn test_sequential_versions_increase() {
        let versioner = versioner();
        let first = versioner.version(artifact(), None).await.unwrap();
        versioner.commit(&first).await.unwrap();
        let id = first.content_id;

        let mut numbers = vec![first.version_number];
        for _ in 0..2 {
            let next = versioner.version(artifact(), Some(id)).await.unwrap();
            assert_eq!(next.parent_version_id, Some(VersionId::new(id, *numbers.last().unwrap())));
            versioner.commit(&next).await.unwrap();
            numbers.push(next.version_number);
        }
        assert_eq!(numbers, vec![1, 2, 3]);

        let history = versioner.history(&first.lineage()).await.unwrap();
        assert_eq!(history.iter().map(|v| v.version_number).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_unknown_prior_starts_at_one() {
        let versioner = versioner();
        let id = ContentId::new();
        let content = versioner.version(artifact(), Some(id)).await.unwrap();
        assert_eq!(content.content_id, id);
        assert_eq!(content.version_number, 1);
        assert!(content.parent_version_id.is_none());
    }

    #[tokio::test]
    async fn test_existing_lineages_match_topic_and_kind() {
        let versioner = versioner();
        let stored = versioner.version(artifact(), None).await.unwrap();
        versioner.commit(&stored).await.unwrap();

        let header = artifact().header;
        assert_eq!(versioner.existing_lineages(&header).await.unwrap(), vec![stored.lineage()]);

        let mut other_topic = header.clone();
        other_topic.topic = "Subtraction".into();
        assert!(versioner.existing_lineages(&other_topic).await.unwrap().is_empty());

        let mut other_kind = header;
        other_kind.agent_kind = AgentKind::CoursePlanner;
        assert!(versioner.existing_lineages(&other_kind).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_conflict_on_taken_slot() {
        let versioner = versioner();
        let content = versioner.version(artifact(), None).await.unwrap();
        versioner.commit(&content).await.unwrap();
        let err = versioner.commit(&content).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }
}
