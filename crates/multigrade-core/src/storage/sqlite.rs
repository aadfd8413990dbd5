//! SQLite-backed content store.
//!
//! `rusqlite` is synchronous, so every query runs on the blocking pool
//! behind a `std::sync::Mutex`.

use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task;
use tracing::{debug, info};

use super::{ContentStore, PutMode, StorageError, StorageResult, check_path};
use crate::agents::AgentKind;
use crate::content::{
    ContentId, ContentPath, LineageKey, NO_CHAPTER, VersionedContent, normalize_segment,
};

/// Durable store; one row per version, keyed by the full path.
pub struct SqliteContentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteContentStore {
    /// Opens (or creates) the database at `path`.
    ///
    /// # Errors
    /// * `StorageError::Io` - If the parent directory cannot be created
    /// * `StorageError::Database` - If the database connection fails
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %path.display(), "Opening content database");
        Self::init(Connection::open(path)?)
    }

    /// Opens an in-memory database for testing.
    ///
    /// # Errors
    /// * `StorageError::Database` - If the database connection fails
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StorageResult<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS content_versions (
                subject TEXT NOT NULL,
                chapter TEXT NOT NULL,
                topic TEXT NOT NULL,
                agent_kind TEXT NOT NULL,
                content_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                content_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (subject, chapter, topic, agent_kind, content_id, version)
            )
            "#,
            [],
        )?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StorageError::Task("database connection lock poisoned".to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

fn chapter_column(lineage: &LineageKey) -> String {
    lineage.chapter.clone().unwrap_or_else(|| NO_CHAPTER.to_string())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn put(
        &self,
        path: &ContentPath,
        content: &VersionedContent,
        mode: PutMode,
    ) -> StorageResult<()> {
        check_path(path, content)?;
        let json = serde_json::to_string(content)?;
        let created_at = content.artifact.header.created_at.to_rfc3339();
        let verb = match mode {
            PutMode::CreateOnly => "INSERT",
            PutMode::Overwrite => "INSERT OR REPLACE",
        };
        let sql = format!(
            "{verb} INTO content_versions \
             (subject, chapter, topic, agent_kind, content_id, version, content_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        );
        let path = path.clone();
        let stored_at = path.clone();
        self.with_conn(move |conn| {
            let lineage = &path.lineage;
            conn.execute(
                &sql,
                params![
                    lineage.subject,
                    chapter_column(lineage),
                    lineage.topic,
                    lineage.agent_kind.as_str(),
                    lineage.content_id.to_string(),
                    path.version,
                    json,
                    created_at,
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StorageError::Conflict(path.to_string())
                } else {
                    StorageError::Database(e)
                }
            })
        })
        .await?;
        debug!(path = %stored_at, "Stored content row");
        Ok(())
    }

    async fn get(&self, path: &ContentPath) -> StorageResult<VersionedContent> {
        let path = path.clone();
        self.with_conn(move |conn| {
            let lineage = &path.lineage;
            let json: Option<String> = conn
                .query_row(
                    "SELECT content_json FROM content_versions \
                     WHERE subject = ?1 AND chapter = ?2 AND topic = ?3 AND agent_kind = ?4 \
                     AND content_id = ?5 AND version = ?6",
                    params![
                        lineage.subject,
                        chapter_column(lineage),
                        lineage.topic,
                        lineage.agent_kind.as_str(),
                        lineage.content_id.to_string(),
                        path.version,
                    ],
                    |row| row.get(0),
                )
                .optional()?;
            let json = json.ok_or_else(|| StorageError::NotFound(path.to_string()))?;
            Ok(serde_json::from_str(&json)?)
        })
        .await
    }

    async fn list_versions(&self, lineage: &LineageKey) -> StorageResult<Vec<u32>> {
        let lineage = lineage.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT version FROM content_versions \
                 WHERE subject = ?1 AND chapter = ?2 AND topic = ?3 AND agent_kind = ?4 AND content_id = ?5 \
                 ORDER BY version ASC",
            )?;
            let versions = stmt
                .query_map(
                    params![
                        lineage.subject,
                        chapter_column(&lineage),
                        lineage.topic,
                        lineage.agent_kind.as_str(),
                        lineage.content_id.to_string(),
                    ],
                    |row| row.get::<_, u32>(0),
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(versions)
        })
        .await
    }

    async fn list_lineages(&self, subject: Option<&str>) -> StorageResult<Vec<LineageKey>> {
        let subject = subject.map(normalize_segment);
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT subject, chapter, topic, agent_kind, content_id FROM content_versions \
                     WHERE ?1 IS NULL OR subject = ?1 \
                     ORDER BY subject, chapter, topic, agent_kind, content_id",
                )?;
                let rows = stmt
                    .query_map(params![subject], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(subject, chapter, topic, kind, id)| -> StorageResult<LineageKey> {
                let agent_kind = kind
                    .parse::<AgentKind>()
                    .map_err(|e| StorageError::InvalidData(e.to_string()))?;
                let content_id = id
                    .parse::<ContentId>()
                    .map_err(|e| StorageError::InvalidData(format!("bad content id '{id}': {e}")))?;
                let chapter = (chapter != NO_CHAPTER).then_some(chapter.as_str());
                Ok(LineageKey::from_stored(subject, chapter, topic, agent_kind, content_id))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{ArtifactBody, ArtifactHeader, GeneratedArtifact};
    use crate::context::{GradeSet, RequestContext};
    use tempfile::TempDir;

    fn content(chapter: Option<&str>, version: u32, id: ContentId) -> VersionedContent {
        let mut builder =
            RequestContext::builder(GradeSet::parse_list("1,2").unwrap(), "English", "Two Little Hands");
        if let Some(chapter) = chapter {
            builder = builder.chapter(chapter);
        }
        let ctx = builder.build().unwrap();
        VersionedContent {
            content_id: id,
            version_number: version,
            parent_version_id: None,
            artifact: GeneratedArtifact::new(
                ArtifactHeader::from_context(AgentKind::CoursePlanner, &ctx),
                ArtifactBody::Unstructured { raw_text: "plan".into(), partial_json: None },
            ),
        }
    }

    #[tokio::test]
    async fn test_round_trip_and_versions() {
        let store = SqliteContentStore::open_in_memory().unwrap();
        let id = ContentId::new();
        for v in [1, 2] {
            let c = content(Some("Unit 1"), v, id);
            store.put(&c.path(), &c, PutMode::CreateOnly).await.unwrap();
        }
        let c1 = content(Some("Unit 1"), 1, id);
        assert_eq!(store.list_versions(&c1.lineage()).await.unwrap(), vec![1, 2]);
        let loaded = store.get(&c1.path()).await.unwrap();
        assert_eq!(loaded.artifact.body, c1.artifact.body);
        assert_eq!(loaded.artifact.header.applicable_grades, c1.artifact.header.applicable_grades);
    }

    #[tokio::test]
    async fn test_primary_key_gives_conflict() {
        let store = SqliteContentStore::open_in_memory().unwrap();
        let c = content(None, 1, ContentId::new());
        store.put(&c.path(), &c, PutMode::CreateOnly).await.unwrap();
        let err = store.put(&c.path(), &c, PutMode::CreateOnly).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        store.put(&c.path(), &c, PutMode::Overwrite).await.unwrap();
    }

    #[tokio::test]
    async fn test_lineages_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("nested").join("content.db");
        let c = content(None, 1, ContentId::new());
        {
            let store = SqliteContentStore::open(&db_path).unwrap();
            store.put(&c.path(), &c, PutMode::CreateOnly).await.unwrap();
        }
        let store = SqliteContentStore::open(&db_path).unwrap();
        assert_eq!(store.list_lineages(Some("English")).await.unwrap(), vec![c.lineage()]);
        assert!(store.list_lineages(Some("Science")).await.unwrap().is_empty());
        assert_eq!(store.latest(&c.lineage()).await.unwrap().unwrap().version_number, 1);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = SqliteContentStore::open_in_memory().unwrap();
        let c = content(None, 1, ContentId::new());
        assert!(matches!(store.get(&c.path()).await, Err(StorageError::NotFound(_))));
    }
}
