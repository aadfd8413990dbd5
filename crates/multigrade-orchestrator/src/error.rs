// Error types for backend generation

use thiserror::Error;

/// Why a generation call produced no text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The last attempt timed out, or the overall deadline passed.
    #[error("Generation timed out after {attempts} attempt(s): {message}")]
    Timeout {
        /// Backend attempts made
        attempts: u32,
        /// Detail of the final timeout
        message: String,
    },

    /// The backend refused the request; retrying would not help.
    #[error("Backend rejected request: {message}")]
    BackendRejected {
        /// Backend attempts made
        attempts: u32,
        /// Backend message
        message: String,
    },

    /// Every allowed attempt failed with a transient error.
    #[error("Retries exhausted after {attempts} attempt(s): {message}")]
    RetriesExhausted {
        /// Backend attempts made
        attempts: u32,
        /// Message of the final transient failure
        message: String,
    },

    /// The caller cancelled the request.
    #[error("Generation cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Backend attempts started before cancellation
        attempts: u32,
    },
}

impl GenerationError {
    /// Backend attempts made before the call ended.
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Timeout { attempts, .. }
            | Self::BackendRejected { attempts, .. }
            | Self::RetriesExhausted { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
        }
    }

    /// Returns true for [`GenerationError::Timeout`].
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
