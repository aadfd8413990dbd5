use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable identity shared by every version of one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(Uuid);

impl ContentId {
    /// Mints a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ContentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ContentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// One version of one artifact, rendered `"{content_id}:v{n}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionId {
    pub content_id: ContentId,
    pub version: u32,
}

impl VersionId {
    pub const fn new(content_id: ContentId, version: u32) -> Self {
        Self { content_id, version }
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:v{}", self.content_id, self.version)
    }
}

impl FromStr for VersionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, version) = s.rsplit_once(":v").ok_or_else(|| format!("invalid version id '{s}'"))?;
        let content_id = id.parse().map_err(|e| format!("invalid version id '{s}': {e}"))?;
        let version = version.parse().map_err(|e| format!("invalid version id '{s}': {e}"))?;
        Ok(Self { content_id, version })
    }
}

impl Serialize for VersionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minted_ids_are_unique_v4() {
        let a = ContentId::new();
        let b = ContentId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn test_version_id_display_and_parse() {
        let id = ContentId::new();
        let version = VersionId::new(id, 3);
        let rendered = version.to_string();
        assert_eq!(rendered, format!("{id}:v3"));
        assert_eq!(rendered.parse::<VersionId>().unwrap(), version);
        assert!("not-an-id:v1".parse::<VersionId>().is_err());
        assert!(format!("{id}:vx").parse::<VersionId>().is_err());
    }
}
