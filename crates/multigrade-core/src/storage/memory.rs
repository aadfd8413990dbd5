use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{ContentStore, PutMode, StorageError, StorageResult, check_path};
use crate::content::{ContentPath, LineageKey, VersionedContent, normalize_segment};

/// Process-local store, used for tests and one-shot CLI runs.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    entries: RwLock<BTreeMap<LineageKey, BTreeMap<u32, VersionedContent>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored versions across all lineages.
    pub async fn len(&self) -> usize {
        self.entries.read().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn put(
        &self,
        path: &ContentPath,
        content: &VersionedContent,
        mode: PutMode,
    ) -> StorageResult<()> {
        check_path(path, content)?;
        // Check and insert under the same write guard.
        let mut entries = self.entries.write().await;
        let versions = entries.entry(path.lineage.clone()).or_default();
        if mode == PutMode::CreateOnly && versions.contains_key(&path.version) {
            return Err(StorageError::Conflict(path.to_string()));
        }
        versions.insert(path.version, content.clone());
        Ok(())
    }

    async fn get(&self, path: &ContentPath) -> StorageResult<VersionedContent> {
        self.entries
            .read()
            .await
            .get(&path.lineage)
            .and_then(|versions| versions.get(&path.version))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn list_versions(&self, lineage: &LineageKey) -> StorageResult<Vec<u32>> {
        Ok(self
            .entries
            .read()
            .await
            .get(lineage)
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn list_lineages(&self, subject: Option<&str>) -> StorageResult<Vec<LineageKey>> {
        let subject = subject.map(normalize_segment);
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|(_, versions)| !versions.is_empty())
            .map(|(lineage, _)| lineage)
            .filter(|lineage| subject.as_ref().is_none_or(|s| &lineage.subject == s))
            .cloned()
            .collect())
    }
}
