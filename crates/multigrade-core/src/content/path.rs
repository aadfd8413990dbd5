//! Hierarchical store keys: subject, chapter, topic, agent kind, content id
//! and version.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::{ContentId, VersionId};
use crate::agents::AgentKind;
use crate::artifacts::ArtifactHeader;

/// Placeholder segment for a lineage without a chapter.
pub const NO_CHAPTER: &str = "_";

/// Normalises one key segment: trimmed and whitespace runs collapsed to `_`.
///
/// `%` and `/` are percent-encoded, and a segment that would read as
/// [`NO_CHAPTER`] is encoded as `%5F`, so distinct names never share a key.
pub fn normalize_segment(raw: &str) -> String {
    let joined = raw.split_whitespace().collect::<Vec<_>>().join("_");
    if joined == NO_CHAPTER {
        return "%5F".to_string();
    }
    let mut out = String::with_capacity(joined.len());
    for c in joined.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            c => out.push(c),
        }
    }
    out
}

/// Identity of a sequence of versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineageKey {
    pub subject: String,
    pub chapter: Option<String>,
    pub topic: String,
    pub agent_kind: AgentKind,
    pub content_id: ContentId,
}

impl LineageKey {
    /// Builds a key, normalising every text segment.
    pub fn new(
        subject: &str,
        chapter: Option<&str>,
        topic: &str,
        agent_kind: AgentKind,
        content_id: ContentId,
    ) -> Self {
        Self {
            subject: normalize_segment(subject),
            chapter: chapter.map(normalize_segment).filter(|c| !c.is_empty() && c != NO_CHAPTER),
            topic: normalize_segment(topic),
            agent_kind,
            content_id,
        }
    }

    /// Rebuilds a key from segments that are already normalised, as read
    /// back from a key string or a store row.
    pub fn from_stored(
        subject: impl Into<String>,
        chapter: Option<&str>,
        topic: impl Into<String>,
        agent_kind: AgentKind,
        content_id: ContentId,
    ) -> Self {
        Self {
            subject: subject.into(),
            chapter: chapter.filter(|c| !c.is_empty() && *c != NO_CHAPTER).map(str::to_string),
            topic: topic.into(),
            agent_kind,
            content_id,
        }
    }

    /// Lineage an artifact with `header` belongs to under `content_id`.
    pub fn for_artifact(header: &ArtifactHeader, content_id: ContentId) -> Self {
        Self::new(
            &header.subject,
            header.chapter.as_deref(),
            &header.topic,
            header.agent_kind,
            content_id,
        )
    }

    /// True when `other` covers the same subject, chapter, topic and agent
    /// kind, under any content id.
    pub fn same_topic(&self, other: &Self) -> bool {
        self.subject == other.subject
            && self.chapter == other.chapter
            && self.topic == other.topic
            && self.agent_kind == other.agent_kind
    }

    /// `subject/chapter/topic/agent_kind/content_id`.
    pub fn key_prefix(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.subject,
            self.chapter.as_deref().unwrap_or(NO_CHAPTER),
            self.topic,
            self.agent_kind,
            self.content_id
        )
    }

    /// Path of version `version` in this lineage.
    pub fn at(&self, version: u32) -> ContentPath {
        ContentPath { lineage: self.clone(), version }
    }
}

impl fmt::Display for LineageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key_prefix())
    }
}

/// Full location of one stored version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentPath {
    pub lineage: LineageKey,
    pub version: u32,
}

impl ContentPath {
    pub fn version_id(&self) -> VersionId {
        VersionId::new(self.lineage.content_id, self.version)
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/v{}", self.lineage.key_prefix(), self.version)
    }
}

/// Error parsing a [`ContentPath`] from its key string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid content path '{path}': {reason}")]
pub struct InvalidContentPath {
    pub path: String,
    pub reason: String,
}

impl FromStr for ContentPath {
    type Err = InvalidContentPath;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            |reason: &str| InvalidContentPath { path: s.to_string(), reason: reason.to_string() };
        let parts: Vec<&str> = s.trim().trim_matches('/').split('/').collect();
        let [subject, chapter, topic, kind, id, version] = parts.as_slice() else {
            return Err(invalid("expected subject/chapter/topic/agent_kind/content_id/vN"));
        };
        let agent_kind = kind.parse::<AgentKind>().map_err(|e| invalid(&e.to_string()))?;
        let content_id = id.parse::<ContentId>().map_err(|e| invalid(&e.to_string()))?;
        let version = version
            .strip_prefix('v')
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| invalid("version segment must look like v1"))?;
        if [subject, topic].iter().any(|segment| segment.is_empty()) {
            return Err(invalid("subject and topic segments must not be empty"));
        }
        Ok(LineageKey::from_stored(*subject, Some(*chapter), *topic, agent_kind, content_id).at(version))
    }
}
