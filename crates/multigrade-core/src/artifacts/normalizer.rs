//! Turns raw model output into a structured artifact body.
//!
//! The normalizer never fails: it reports [`NormalizationStatus::Degraded`]
//! with the raw text preserved when the output does not fit the schema, and
//! [`NormalizationStatus::Failed`] only when there is nothing to keep.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

use super::lenient;
use super::model::ArtifactBody;
use super::schema::ArtifactSchema;
use crate::agents::AgentKind;

/// Knobs that move the boundary between Success and Degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Treat empty mandatory strings and collections as missing.
    pub reject_empty_collections: bool,
    /// Accept numeric strings for integers and bare strings for lists.
    pub coerce_scalars: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self { reject_empty_collections: true, coerce_scalars: true }
    }
}

/// Result quality of one normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationStatus {
    Success,
    Degraded,
    Failed,
}

impl NormalizationStatus {
    /// True when `self` is a strictly better outcome than `other`.
    pub const fn improves_on(self, other: Self) -> bool {
        self.rank() > other.rank()
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Failed => 0,
            Self::Degraded => 1,
            Self::Success => 2,
        }
    }
}

impl fmt::Display for NormalizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        })
    }
}

/// Output of [`Normalizer::normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Absent only when status is `Failed`.
    pub body: Option<ArtifactBody>,
    pub status: NormalizationStatus,
    pub diagnostic: Option<String>,
}

impl Normalized {
    /// True unless the output held no JSON value at all.
    pub fn found_json(&self) -> bool {
        !matches!(self.body, None | Some(ArtifactBody::Unstructured { partial_json: None, .. }))
    }

    fn success(body: ArtifactBody) -> Self {
        Self { body: Some(body), status: NormalizationStatus::Success, diagnostic: None }
    }

    fn degraded(raw: &str, partial_json: Option<Value>, diagnostic: String) -> Self {
        Self {
            body: Some(ArtifactBody::Unstructured { raw_text: raw.to_string(), partial_json }),
            status: NormalizationStatus::Degraded,
            diagnostic: Some(diagnostic),
        }
    }

    fn failed(diagnostic: impl Into<String>) -> Self {
        Self { body: None, status: NormalizationStatus::Failed, diagnostic: Some(diagnostic.into()) }
    }
}

/// Schema-aware parser for model output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub const fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> NormalizerConfig {
        self.config
    }

    /// Parses `raw` into the body expected for `kind`.
    pub fn normalize(&self, kind: AgentKind, raw: &str) -> Normalized {
        if raw.trim().is_empty() {
            warn!(agent_kind = %kind, "Backend returned empty output");
            return Normalized::failed("backend returned empty output");
        }

        let Some(parsed) = extract_json_object(raw) else {
            debug!(agent_kind = %kind, raw_len = raw.len(), "No JSON object in output");
            return Normalized::degraded(raw, None, "no JSON object found in model output".into());
        };

        let schema = ArtifactSchema::for_kind(kind);
        match self.parse_body(kind, schema, parsed.clone()) {
            Ok(body) => {
                let empty = body.empty_mandatory_fields();
                if self.config.reject_empty_collections && !empty.is_empty() {
                    debug!(agent_kind = %kind, fields = ?empty, "Mandatory fields empty");
                    return Normalized::degraded(
                        raw,
                        Some(parsed),
                        format!("mandatory fields are empty: {}", empty.join(", ")),
                    );
                }
                Normalized::success(body)
            }
            Err(err) => {
                debug!(agent_kind = %kind, error = %err, "Output does not match schema");
                Normalized::degraded(
                    raw,
                    Some(parsed),
                    format!("output does not match the {kind} schema: {err}"),
                )
            }
        }
    }

    fn parse_body(
        &self,
        kind: AgentKind,
        schema: &ArtifactSchema,
        mut value: Value,
    ) -> Result<ArtifactBody, serde_json::Error> {
        if self.config.coerce_scalars {
            let rewritten = lenient::coerce(&mut value, schema);
            if rewritten > 0 {
                debug!(agent_kind = %kind, rewritten, "Coerced scalar fields");
            }
        }
        match ArtifactBody::from_value(kind, value.clone()) {
            Ok(body) => Ok(body),
            Err(err) => match unwrap_single_key(value) {
                // Models sometimes nest the payload under one key such as "worksheet".
                Some(inner) => self.parse_body(kind, schema, inner).map_err(|_| err),
                None => Err(err),
            },
        }
    }
}

fn unwrap_single_key(value: Value) -> Option<Value> {
    match value {
        Value::Object(map) if map.len() == 1 => {
            map.into_iter().next().map(|(_, inner)| inner).filter(Value::is_object)
        }
        _ => None,
    }
}

/// Finds a JSON object in `raw`: the fence-stripped text first, then the
/// outermost brace span.
fn extract_json_object(raw: &str) -> Option<Value> {
    let text = strip_code_fences(raw);
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
