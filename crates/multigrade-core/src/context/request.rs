use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ContextError, GradeSet};

/// Longest source text forwarded to a prompt, in characters.
pub const SOURCE_TEXT_LIMIT: usize = 12_000;

/// Names [`RequestContext::field`] resolves; classroom parameters may not
/// reuse them.
pub const CONTEXT_FIELDS: [&str; 7] =
    ["grades", "grade_list", "first_grade", "subject", "topic", "chapter", "source_text"];

/// Well-known classroom parameter keys.
pub mod params {
    pub const CLASS_SIZE: &str = "class_size";
    pub const DURATION_MINUTES: &str = "duration_minutes";
    pub const LEARNING_OBJECTIVES: &str = "learning_objectives";
    pub const COLLABORATION_MODE: &str = "collaboration_mode";
    pub const DIFFICULTY_LEVEL: &str = "difficulty_level";
    pub const ACTIVITY_TYPE: &str = "activity_type";
    pub const ASSESSMENT_TYPE: &str = "assessment_type";
    pub const AID_TYPE: &str = "aid_type";
}

/// Everything the pipeline knows about one teacher request.
///
/// Deserialization goes through [`RequestContextBuilder::build`], so a
/// decoded context is validated like a built one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRequestContext")]
pub struct RequestContext {
    grades: GradeSet,
    subject: String,
    chapter: Option<String>,
    topic: String,
    source_text: Option<String>,
    classroom: BTreeMap<String, String>,
}

/// Unvalidated wire form of [`RequestContext`].
#[derive(Deserialize)]
struct RawRequestContext {
    grades: GradeSet,
    subject: String,
    #[serde(default)]
    chapter: Option<String>,
    topic: String,
    #[serde(default)]
    source_text: Option<String>,
    #[serde(default)]
    classroom: BTreeMap<String, String>,
}

impl TryFrom<RawRequestContext> for RequestContext {
    type Error = ContextError;

    fn try_from(raw: RawRequestContext) -> Result<Self, Self::Error> {
        let mut builder = Self::builder(raw.grades, raw.subject, raw.topic);
        if let Some(chapter) = raw.chapter {
            builder = builder.chapter(chapter);
        }
        if let Some(text) = raw.source_text {
            builder = builder.source_text(text);
        }
        builder.classroom = raw.classroom;
        builder.build()
    }
}

impl RequestContext {
    /// Starts a builder with the three mandatory fields.
    pub fn builder(
        grades: GradeSet,
        subject: impl Into<String>,
        topic: impl Into<String>,
    ) -> RequestContextBuilder {
        RequestContextBuilder {
            grades,
            subject: subject.into(),
            chapter: None,
            topic: topic.into(),
            source_text: None,
            classroom: BTreeMap::new(),
        }
    }

    pub fn grades(&self) -> &GradeSet {
        &self.grades
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn chapter(&self) -> Option<&str> {
        self.chapter.as_deref()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Source text, already cut to [`SOURCE_TEXT_LIMIT`] characters.
    pub fn source_text(&self) -> Option<&str> {
        self.source_text.as_deref()
    }

    /// All classroom parameters in key order.
    pub fn classroom(&self) -> &BTreeMap<String, String> {
        &self.classroom
    }

    /// Looks up a single classroom parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.classroom.get(key).map(String::as_str)
    }

    /// Copy of this context for another topic, carrying `source_text` in
    /// place of any existing source text.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::EmptyField`] for a blank topic.
    pub fn with_topic(&self, topic: &str, source_text: &str) -> Result<Self, ContextError> {
        let mut builder = Self::builder(self.grades.clone(), self.subject.as_str(), topic).source_text(source_text);
        if let Some(chapter) = &self.chapter {
            builder = builder.chapter(chapter.as_str());
        }
        builder.classroom = self.classroom.clone();
        builder.build()
    }

    /// Resolves a named context field, excluding classroom parameters.
    ///
    /// `grades` renders as a comma list, `grade_list` as a JSON array of
    /// grade labels for schema examples.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "grades" => Some(self.grades.to_string()),
            "grade_list" => {
                let labels: Vec<String> = self.grades.iter().map(|g| g.to_string()).collect();
                serde_json::to_string(&labels).ok()
            }
            "first_grade" => self.grades.iter().next().map(|g| g.to_string()),
            "subject" => Some(self.subject.clone()),
            "topic" => Some(self.topic.clone()),
            "chapter" => self.chapter.clone(),
            "source_text" => self.source_text.clone(),
            _ => None,
        }
    }
}

/// Builder for [`RequestContext`].
#[derive(Debug, Clone)]
pub struct RequestContextBuilder {
    grades: GradeSet,
    subject: String,
    chapter: Option<String>,
    topic: String,
    source_text: Option<String>,
    classroom: BTreeMap<String, String>,
}

impl RequestContextBuilder {
    #[must_use]
    pub fn chapter(mut self, chapter: impl Into<String>) -> Self {
        let chapter = chapter.into();
        self.chapter = (!chapter.trim().is_empty()).then_some(chapter);
        self
    }

    /// Attaches source text (for example one topic of an uploaded chapter).
    #[must_use]
    pub fn source_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.source_text = if text.chars().count() > SOURCE_TEXT_LIMIT {
            Some(text.chars().take(SOURCE_TEXT_LIMIT).collect())
        } else if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };
        self
    }

    /// Sets an arbitrary classroom parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.classroom.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn class_size(self, students: u32) -> Self {
        self.param(params::CLASS_SIZE, students.to_string())
    }

    #[must_use]
    pub fn duration_minutes(self, minutes: u32) -> Self {
        self.param(params::DURATION_MINUTES, minutes.to_string())
    }

    #[must_use]
    pub fn learning_objectives(self, objectives: impl Into<String>) -> Self {
        self.param(params::LEARNING_OBJECTIVES, objectives)
    }

    #[must_use]
    pub fn collaboration_mode(self, mode: impl Into<String>) -> Self {
        self.param(params::COLLABORATION_MODE, mode)
    }

    #[must_use]
    pub fn difficulty_level(self, level: impl Into<String>) -> Self {
        self.param(params::DIFFICULTY_LEVEL, level)
    }

    #[must_use]
    pub fn activity_type(self, kind: impl Into<String>) -> Self {
        self.param(params::ACTIVITY_TYPE, kind)
    }

    #[must_use]
    pub fn assessment_type(self, kind: impl Into<String>) -> Self {
        self.param(params::ASSESSMENT_TYPE, kind)
    }

    #[must_use]
    pub fn aid_type(self, kind: impl Into<String>) -> Self {
        self.param(params::AID_TYPE, kind)
    }

    /// Validates and freezes the context.
    ///
    /// # Errors
    /// Returns [`ContextError::EmptyField`] for a blank subject or topic,
    /// [`ContextError::ReservedParameter`] for a parameter named like a
    /// context field, and [`ContextError::InvalidParameter`] when a numeric
    /// parameter is not a positive integer.
    pub fn build(self) -> Result<RequestContext, ContextError> {
        let subject = self.subject.trim().to_string();
        let topic = self.topic.trim().to_string();
        if subject.is_empty() {
            return Err(ContextError::EmptyField("subject"));
        }
        if topic.is_empty() {
            return Err(ContextError::EmptyField("topic"));
        }

        if let Some(key) = self.classroom.keys().find(|key| CONTEXT_FIELDS.contains(&key.as_str())) {
            return Err(ContextError::ReservedParameter(key.clone()));
        }

        for key in [params::CLASS_SIZE, params::DURATION_MINUTES] {
            if let Some(value) = self.classroom.get(key) {
                match value.trim().parse::<u32>() {
                    Ok(n) if n > 0 => {}
                    _ => {
                        return Err(ContextError::InvalidParameter {
                            key: key.to_string(),
                            value: value.clone(),
                        });
                    }
                }
            }
        }

        Ok(RequestContext {
            grades: self.grades,
            subject,
            chapter: self.chapter.map(|c| c.trim().to_string()),
            topic,
            source_text: self.source_text,
            classroom: self.classroom,
        })
    }
}
