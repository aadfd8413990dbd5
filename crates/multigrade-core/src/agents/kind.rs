use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The content-generation roles offered to teachers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Daily lesson plans with timed, grade-tagged segments.
    CoursePlanner,
    /// Hands-on learning activities with per-grade adaptations.
    ActivityGenerator,
    /// Per-grade practice worksheets with an answer key.
    WorksheetGenerator,
    /// Assessment components with grade-specific tasks.
    AssessmentGenerator,
    /// Descriptions of posters, charts and other visual aids.
    VisualAidGenerator,
    /// Cross-grade peer learning and mentoring activities.
    PeerActivityGenerator,
}

impl AgentKind {
    /// Every agent kind, in display order.
    pub const ALL: [AgentKind; 6] = [
        AgentKind::CoursePlanner,
        AgentKind::ActivityGenerator,
        AgentKind::WorksheetGenerator,
        AgentKind::AssessmentGenerator,
        AgentKind::VisualAidGenerator,
        AgentKind::PeerActivityGenerator,
    ];

    /// Stable machine identifier, used in store keys.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CoursePlanner => "course_planner",
            Self::ActivityGenerator => "activity_generator",
            Self::WorksheetGenerator => "worksheet_generator",
            Self::AssessmentGenerator => "assessment_generator",
            Self::VisualAidGenerator => "visual_aid_generator",
            Self::PeerActivityGenerator => "peer_activity_generator",
        }
    }

    /// Human-readable label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::CoursePlanner => "Course Planner",
            Self::ActivityGenerator => "Activity Generator",
            Self::WorksheetGenerator => "Worksheet Generator",
            Self::AssessmentGenerator => "Assessment Generator",
            Self::VisualAidGenerator => "Visual Aid Generator",
            Self::PeerActivityGenerator => "Peer Activity Generator",
        }
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no agent kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown agent kind '{0}'")]
pub struct UnknownAgentKind(pub String);

impl FromStr for AgentKind {
    type Err = UnknownAgentKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        let kind = match normalized.as_str() {
            "course_planner" | "course" | "planner" | "lesson_plan" => Self::CoursePlanner,
            "activity_generator" | "activity" => Self::ActivityGenerator,
            "worksheet_generator" | "worksheet" => Self::WorksheetGenerator,
            "assessment_generator" | "assessment" => Self::AssessmentGenerator,
            "visual_aid_generator" | "visual_aids_generator" | "visual_aid" | "visual" => {
                Self::VisualAidGenerator
            }
            "peer_activity_generator" | "peer_activity" | "peer" => Self::PeerActivityGenerator,
            _ => return Err(UnknownAgentKind(s.to_string())),
        };
        Ok(kind)
    }
}
