//! Static schema facts per agent kind.

use crate::agents::AgentKind;

/// A path into a JSON document. `"[]"` steps into every array element.
pub type FieldPath = &'static [&'static str];

/// What the normalizer and registry need to know about a kind's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactSchema {
    pub kind: AgentKind,
    /// Top-level mandatory fields, in declaration order.
    pub mandatory_fields: &'static [&'static str],
    /// Placeholders a prompt template must contain so the model has the
    /// inputs the mandatory fields depend on.
    pub required_placeholders: &'static [&'static str],
    /// Integer fields that may arrive as numeric strings.
    pub integer_fields: &'static [FieldPath],
    /// String-list fields that may arrive as a single string.
    pub list_fields: &'static [FieldPath],
}

const COURSE_PLAN: ArtifactSchema = ArtifactSchema {
    kind: AgentKind::CoursePlanner,
    mandatory_fields: &["lesson_title", "total_duration_minutes", "segments"],
    required_placeholders: &["grades", "subject", "topic", "duration_minutes"],
    integer_fields: &[&["total_duration_minutes"], &["segments", "[]", "duration_minutes"]],
    list_fields: &[&["segments", "[]", "grades"], &["materials_needed"]],
};

const ACTIVITY: ArtifactSchema = ArtifactSchema {
    kind: AgentKind::ActivityGenerator,
    mandatory_fields: &[
        "activity_title",
        "estimated_duration_minutes",
        "grade_adaptations",
        "steps",
    ],
    required_placeholders: &["grades", "subject", "topic", "duration_minutes"],
    integer_fields: &[&["estimated_duration_minutes"], &["steps", "[]", "step"]],
    list_fields: &[&["materials_needed"]],
};

const WORKSHEET: ArtifactSchema = ArtifactSchema {
    kind: AgentKind::WorksheetGenerator,
    mandatory_fields: &["worksheet_title", "grade_sections", "answer_key"],
    required_placeholders: &["grades", "subject", "topic"],
    integer_fields: &[
        &["grade_sections", "[]", "questions", "[]", "number"],
        &["answer_key", "[]", "question_number"],
    ],
    list_fields: &[],
};

const ASSESSMENT: ArtifactSchema = ArtifactSchema {
    kind: AgentKind::AssessmentGenerator,
    mandatory_fields: &["assessment_title", "components"],
    required_placeholders: &["grades", "subject", "topic"],
    integer_fields: &[],
    list_fields: &[],
};

const VISUAL_AID: ArtifactSchema = ArtifactSchema {
    kind: AgentKind::VisualAidGenerator,
    mandatory_fields: &["visual_aid_title", "aid_type", "content_description", "grade_elements"],
    required_placeholders: &["grades", "subject", "topic", "aid_type"],
    integer_fields: &[],
    list_fields: &[&["materials_needed"]],
};

const PEER_ACTIVITY: ArtifactSchema = ArtifactSchema {
    kind: AgentKind::PeerActivityGenerator,
    mandatory_fields: &["activity_title", "collaboration_type", "grouping_strategy", "roles"],
    required_placeholders: &["grades", "subject", "topic", "class_size", "collaboration_mode"],
    integer_fields: &[&["grouping_strategy", "group_size"]],
    list_fields: &[&["roles", "[]", "suitable_grades"], &["roles", "[]", "responsibilities"]],
};

impl ArtifactSchema {
    /// Schema for `kind`.
    pub const fn for_kind(kind: AgentKind) -> &'static Self {
        match kind {
            AgentKind::CoursePlanner => &COURSE_PLAN,
            AgentKind::ActivityGenerator => &ACTIVITY,
            AgentKind::WorksheetGenerator => &WORKSHEET,
            AgentKind::AssessmentGenerator => &ASSESSMENT,
            AgentKind::VisualAidGenerator => &VISUAL_AID,
            AgentKind::PeerActivityGenerator => &PEER_ACTIVITY,
        }
    }

    /// Placeholders a kind's template must contain.
    pub const fn required_placeholders(kind: AgentKind) -> &'static [&'static str] {
        Self::for_kind(kind).required_placeholders
    }
}
