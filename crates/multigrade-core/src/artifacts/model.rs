use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::bodies::{Activity, Assessment, CoursePlan, MandatoryFields, PeerActivity, VisualAid, Worksheet};
use crate::agents::AgentKind;
use crate::context::{GradeSet, RequestContext};

/// Identity fields every artifact carries regardless of kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub agent_kind: AgentKind,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    pub topic: String,
    pub applicable_grades: GradeSet,
    pub created_at: DateTime<Utc>,
}

impl ArtifactHeader {
    /// Header for an artifact produced now from `context`.
    pub fn from_context(kind: AgentKind, context: &RequestContext) -> Self {
        Self {
            agent_kind: kind,
            subject: context.subject().to_string(),
            chapter: context.chapter().map(str::to_string),
            topic: context.topic().to_string(),
            applicable_grades: context.grades().clone(),
            created_at: Utc::now(),
        }
    }
}

/// Kind-specific content of an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ArtifactBody {
    CoursePlan(CoursePlan),
    Activity(Activity),
    Worksheet(Worksheet),
    Assessment(Assessment),
    VisualAid(VisualAid),
    PeerActivity(PeerActivity),
    /// Fallback when the model output did not match the expected schema.
    Unstructured {
        raw_text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partial_json: Option<Value>,
    },
}

impl ArtifactBody {
    /// Parses a JSON value into the body expected for `kind`.
    pub(crate) fn from_value(kind: AgentKind, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            AgentKind::CoursePlanner => Self::CoursePlan(serde_json::from_value(value)?),
            AgentKind::ActivityGenerator => Self::Activity(serde_json::from_value(value)?),
            AgentKind::WorksheetGenerator => Self::Worksheet(serde_json::from_value(value)?),
            AgentKind::AssessmentGenerator => Self::Assessment(serde_json::from_value(value)?),
            AgentKind::VisualAidGenerator => Self::VisualAid(serde_json::from_value(value)?),
            AgentKind::PeerActivityGenerator => Self::PeerActivity(serde_json::from_value(value)?),
        })
    }

    /// Serializes the structured fields back to the model's JSON shape.
    pub fn to_value(&self) -> Value {
        let value = match self {
            Self::CoursePlan(b) => serde_json::to_value(b),
            Self::Activity(b) => serde_json::to_value(b),
            Self::Worksheet(b) => serde_json::to_value(b),
            Self::Assessment(b) => serde_json::to_value(b),
            Self::VisualAid(b) => serde_json::to_value(b),
            Self::PeerActivity(b) => serde_json::to_value(b),
            Self::Unstructured { raw_text, .. } => return Value::String(raw_text.clone()),
        };
        value.unwrap_or(Value::Null)
    }

    pub(crate) fn empty_mandatory_fields(&self) -> Vec<String> {
        match self {
            Self::CoursePlan(b) => b.empty_mandatory_fields(),
            Self::Activity(b) => b.empty_mandatory_fields(),
            Self::Worksheet(b) => b.empty_mandatory_fields(),
            Self::Assessment(b) => b.empty_mandatory_fields(),
            Self::VisualAid(b) => b.empty_mandatory_fields(),
            Self::PeerActivity(b) => b.empty_mandatory_fields(),
            Self::Unstructured { .. } => Vec::new(),
        }
    }

    /// Returns true for the fallback body.
    pub const fn is_unstructured(&self) -> bool {
        matches!(self, Self::Unstructured { .. })
    }

    /// The title the model gave the artifact, if it is structured.
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::CoursePlan(b) => Some(&b.lesson_title),
            Self::Activity(b) => Some(&b.activity_title),
            Self::Worksheet(b) => Some(&b.worksheet_title),
            Self::Assessment(b) => Some(&b.assessment_title),
            Self::VisualAid(b) => Some(&b.visual_aid_title),
            Self::PeerActivity(b) => Some(&b.activity_title),
            Self::Unstructured { .. } => None,
        }
    }
}

/// A normalized artifact: identity header plus kind-specific body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub header: ArtifactHeader,
    pub body: ArtifactBody,
}

impl GeneratedArtifact {
    pub const fn new(header: ArtifactHeader, body: ArtifactBody) -> Self {
        Self { header, body }
    }

    pub const fn kind(&self) -> AgentKind {
        self.header.agent_kind
    }
}
