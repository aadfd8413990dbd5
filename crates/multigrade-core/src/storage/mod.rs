//! Content store contract and its implementations.
//!
//! Keys are hierarchical (subject, chapter, topic, agent kind, content id,
//! version). The only write guarantee is a per-key conditional create,
//! which is what lets concurrent versioners detect a lost race.

pub mod error;
mod memory;
mod sqlite;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryContentStore;
pub use sqlite::SqliteContentStore;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{StoreKind, StoreSection};
use crate::content::{ContentPath, LineageKey, VersionedContent};

/// Write semantics for [`ContentStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Fail with [`StorageError::Conflict`] if the slot exists.
    CreateOnly,
    /// Replace whatever is stored at the slot.
    Overwrite,
}

/// Persistence for versioned content.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Stores `content` at `path`.
    async fn put(&self, path: &ContentPath, content: &VersionedContent, mode: PutMode)
    -> StorageResult<()>;

    /// Reads the content stored at `path`.
    async fn get(&self, path: &ContentPath) -> StorageResult<VersionedContent>;

    /// Version numbers stored for `lineage`, ascending.
    async fn list_versions(&self, lineage: &LineageKey) -> StorageResult<Vec<u32>>;

    /// Every lineage, optionally restricted to one subject.
    async fn list_lineages(&self, subject: Option<&str>) -> StorageResult<Vec<LineageKey>>;

    /// The highest stored version of `lineage`, if any.
    async fn latest(&self, lineage: &LineageKey) -> StorageResult<Option<VersionedContent>> {
        match self.list_versions(lineage).await?.last() {
            Some(&version) => self.get(&lineage.at(version)).await.map(Some),
            None => Ok(None),
        }
    }
}

/// Rejects a put whose path disagrees with the content it carries.
pub(crate) fn check_path(path: &ContentPath, content: &VersionedContent) -> StorageResult<()> {
    let expected = content.path();
    if *path == expected {
        Ok(())
    } else {
        Err(StorageError::InvalidData(format!(
            "content for {expected} cannot be stored at {path}"
        )))
    }
}

/// Opens the store described by the `[store]` config section.
///
/// # Errors
///
/// Returns [`StorageError::InvalidData`] for a sqlite store without a path
/// and the open errors of [`SqliteContentStore`].
pub fn open_store(section: &StoreSection) -> StorageResult<Arc<dyn ContentStore>> {
    match (section.kind, &section.path) {
        (StoreKind::Memory, _) => Ok(Arc::new(InMemoryContentStore::new())),
        (StoreKind::Sqlite, Some(path)) => Ok(Arc::new(SqliteContentStore::open(path)?)),
        (StoreKind::Sqlite, None) => {
            Err(StorageError::InvalidData("sqlite store requires a path".to_string()))
        }
    }
}
