//! Mapping of HTTP transport failures onto `BackendError`.
//!
//! Every HTTP backend funnels its failures through these helpers so the
//! retry policy sees the same classification regardless of provider.

use multigrade_abstraction::BackendError;
use reqwest::StatusCode;

/// Classifies a non-success HTTP status returned by a provider.
pub fn classify_status(provider: &str, status: StatusCode, body: &str) -> BackendError {
    let message = format!("{} API error ({}): {}", provider, status, body.trim());
    match status.as_u16() {
        408 | 504 => BackendError::Timeout(message),
        429 | 500 | 502 | 503 | 529 => BackendError::Transient(message),
        _ => BackendError::NonTransient(message),
    }
}

/// Classifies a failure raised by reqwest before a status was received.
pub fn classify_transport(provider: &str, base_url: &str, err: &reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(format!("{} request timed out: {}", provider, err))
    } else if err.is_connect() {
        BackendError::Transient(format!("{} not reachable at {}: {}", provider, base_url, err))
    } else if err.is_builder() {
        BackendError::NonTransient(format!("invalid {} request: {}", provider, err))
    } else {
        BackendError::Transient(format!("{} network error: {}", provider, err))
    }
}
