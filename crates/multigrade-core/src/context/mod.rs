//! Request context for a single generation call.
//!
//! A [`RequestContext`] carries the grades, subject, topic and classroom
//! options a teacher supplies. It is built once per action, validated at
//! construction and immutable afterwards.

mod grade;
mod request;

pub use grade::{Grade, GradeSet, MAX_GRADE};
pub use request::{CONTEXT_FIELDS, RequestContext, RequestContextBuilder, SOURCE_TEXT_LIMIT, params};

use thiserror::Error;

/// Errors raised while building a request context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// A grade identifier could not be parsed or was out of range.
    #[error("invalid grade '{0}' (expected 1-{MAX_GRADE})")]
    InvalidGrade(String),

    /// No grade was supplied.
    #[error("at least one grade is required")]
    NoGrades,

    /// A required text field was empty.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// A classroom parameter reused the name of a context field.
    #[error("classroom parameter '{0}' shadows a context field of the same name")]
    ReservedParameter(String),

    /// A classroom parameter had an unusable value.
    #[error("invalid value '{value}' for classroom parameter '{key}'")]
    InvalidParameter {
        /// Parameter name.
        key: String,
        /// Rejected value.
        value: String,
    },
}
