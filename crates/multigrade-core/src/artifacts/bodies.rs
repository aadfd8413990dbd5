//! Structured bodies, one per agent kind.
//!
//! Mandatory fields are typed strictly. Everything else the model returns is
//! kept in a flattened `extra` map so nothing is lost on the way to storage.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Extra fields carried alongside the typed ones.
pub type Extra = Map<String, Value>;

/// An optional field that remembers whether the model sent `null` or left
/// the key out, so both serialize back the way they arrived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Nullable<T> {
    #[default]
    Absent,
    Null,
    Present(T),
}

impl<T> Nullable<T> {
    pub const fn as_ref(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent | Self::Null => None,
        }
    }

    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl<T> From<Option<T>> for Nullable<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Self::Present)
    }
}

impl<T: Serialize> Serialize for Nullable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Present(value) => value.serialize(serializer),
            Self::Absent | Self::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Nullable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // A missing key never reaches here; `#[serde(default)]` gives `Absent`.
        Ok(Option::<T>::deserialize(deserializer)?.map_or(Self::Null, Self::Present))
    }
}

/// Listing of mandatory fields that are present but empty.
pub(crate) trait MandatoryFields {
    fn empty_mandatory_fields(&self) -> Vec<String>;
}

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn push_if(missing: &mut Vec<String>, cond: bool, field: impl Into<String>) {
    if cond {
        missing.push(field.into());
    }
}

// ---------------------------------------------------------------------------
// Course plan

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoursePlan {
    pub lesson_title: String,
    pub total_duration_minutes: u32,
    pub segments: Vec<LessonSegment>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub materials_needed: Nullable<Vec<String>>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A timed slot of the lesson, tagged with the grades it serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonSegment {
    pub time_slot: String,
    pub duration_minutes: u32,
    pub activity: String,
    pub grades: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl MandatoryFields for CoursePlan {
    fn empty_mandatory_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        push_if(&mut missing, blank(&self.lesson_title), "lesson_title");
        push_if(&mut missing, self.segments.is_empty(), "segments");
        for (i, seg) in self.segments.iter().enumerate() {
            push_if(&mut missing, blank(&seg.activity), format!("segments[{i}].activity"));
            push_if(&mut missing, seg.grades.is_empty(), format!("segments[{i}].grades"));
        }
        missing
    }
}

// ---------------------------------------------------------------------------
// Activity

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub activity_title: String,
    pub estimated_duration_minutes: u32,
    pub grade_adaptations: Vec<GradeAdaptation>,
    pub steps: Vec<ActivityStep>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub materials_needed: Nullable<Vec<String>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeAdaptation {
    pub grade: String,
    pub instructions: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityStep {
    pub step: u32,
    pub instruction: String,
    #[serde(flatten)]
    pub extra: Extra,
}

impl MandatoryFields for Activity {
    fn empty_mandatory_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        push_if(&mut missing, blank(&self.activity_title), "activity_title");
        push_if(&mut missing, self.grade_adaptations.is_empty(), "grade_adaptations");
        push_if(&mut missing, self.steps.is_empty(), "steps");
        for (i, a) in self.grade_adaptations.iter().enumerate() {
            push_if(
                &mut missing,
                blank(&a.instructions),
                format!("grade_adaptations[{i}].instructions"),
            );
        }
        missing
    }
}

// ---------------------------------------------------------------------------
// Worksheet

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worksheet {
    pub worksheet_title: String,
    pub grade_sections: Vec<GradeSection>,
    pub answer_key: Vec<AnswerKeyEntry>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub instructions: Nullable<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// The ordered questions for one grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeSection {
    pub grade: String,
    pub questions: Vec<Question>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub number: u32,
    pub prompt: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerKeyEntry {
    pub grade: String,
    pub question_number: u32,
    pub answer: String,
    #[serde(flatten)]
    pub extra: Extra,
}

impl MandatoryFields for Worksheet {
    fn empty_mandatory_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        push_if(&mut missing, blank(&self.worksheet_title), "worksheet_title");
        push_if(&mut missing, self.grade_sections.is_empty(), "grade_sections");
        push_if(&mut missing, self.answer_key.is_empty(), "answer_key");
        for (i, section) in self.grade_sections.iter().enumerate() {
            push_if(
                &mut missing,
                section.questions.is_empty(),
                format!("grade_sections[{i}].questions"),
            );
        }
        missing
    }
}

// ---------------------------------------------------------------------------
// Assessment

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub assessment_title: String,
    pub components: Vec<AssessmentComponent>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub assessment_type: Nullable<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentComponent {
    pub name: String,
    pub grade_tasks: Vec<GradeTask>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeTask {
    pub grade: String,
    pub task: String,
    #[serde(flatten)]
    pub extra: Extra,
}

impl MandatoryFields for Assessment {
    fn empty_mandatory_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        push_if(&mut missing, blank(&self.assessment_title), "assessment_title");
        push_if(&mut missing, self.components.is_empty(), "components");
        for (i, c) in self.components.iter().enumerate() {
            push_if(&mut missing, c.grade_tasks.is_empty(), format!("components[{i}].grade_tasks"));
        }
        missing
    }
}

// ---------------------------------------------------------------------------
// Visual aid

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualAid {
    pub visual_aid_title: String,
    pub aid_type: String,
    pub content_description: ContentDescription,
    pub grade_elements: Vec<GradeElement>,
    #[serde(default, skip_serializing_if = "Nullable::is_absent")]
    pub materials_needed: Nullable<Vec<String>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDescription {
    pub main_visual: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeElement {
    pub grade: String,
    pub visual_focus: String,
    #[serde(flatten)]
    pub extra: Extra,
}

impl MandatoryFields for VisualAid {
    fn empty_mandatory_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        push_if(&mut missing, blank(&self.visual_aid_title), "visual_aid_title");
        push_if(&mut missing, blank(&self.aid_type), "aid_type");
        push_if(
            &mut missing,
            blank(&self.content_description.main_visual),
            "content_description.main_visual",
        );
        push_if(&mut missing, self.grade_elements.is_empty(), "grade_elements");
        missing
    }
}

// ---------------------------------------------------------------------------
// Peer activity

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerActivity {
    pub activity_title: String,
    pub collaboration_type: String,
    pub grouping_strategy: GroupingStrategy,
    pub roles: Vec<PeerRole>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingStrategy {
    pub group_size: u32,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRole {
    pub role_name: String,
    pub suitable_grades: Vec<String>,
    pub responsibilities: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl MandatoryFields for PeerActivity {
    fn empty_mandatory_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        push_if(&mut missing, blank(&self.activity_title), "activity_title");
        push_if(&mut missing, blank(&self.collaboration_type), "collaboration_type");
        push_if(&mut missing, self.roles.is_empty(), "roles");
        for (i, role) in self.roles.iter().enumerate() {
            push_if(
                &mut missing,
                role.suitable_grades.is_empty(),
                format!("roles[{i}].suitable_grades"),
            );
            push_if(
                &mut missing,
                role.responsibilities.is_empty(),
                format!("roles[{i}].responsibilities"),
            );
        }
        missing
    }
}
