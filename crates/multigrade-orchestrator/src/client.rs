//! Backend calls with bounded retries, backoff and timeouts.

use multigrade_abstraction::{
    BackendError, BackendUsage, GenerationBackend, GenerationParameters, GenerationRequest,
};
use multigrade_core::config::RetrySection;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::GenerationError;

/// Retry and timeout bounds for one `generate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// Bound on a single backend call.
    pub attempt_timeout: Duration,
    /// Bound on the whole call, backoff included.
    pub total_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySection::default())
    }
}

impl From<&RetrySection> for RetryPolicy {
    fn from(section: &RetrySection) -> Self {
        Self {
            max_attempts: section.max_attempts.max(1),
            initial_backoff: Duration::from_millis(section.initial_backoff_ms),
            max_backoff: Duration::from_millis(section.max_backoff_ms),
            backoff_multiplier: section.backoff_multiplier,
            attempt_timeout: Duration::from_secs(section.attempt_timeout_secs),
            total_timeout: Duration::from_secs(section.total_timeout_secs),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): `initial *
    /// multiplier^(attempt-1)`, capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = secs.min(self.max_backoff.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_backoff
        }
    }
}

/// How an attempt failed, when it may be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RetryableFailure {
    Transient(String),
    Timeout(String),
}

/// Progress of one `generate` call.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptState {
    Idle,
    Attempting { attempt: u32 },
    Backoff { attempt: u32, delay: Duration },
    Succeeded(GenerationSuccess),
    Rejected { attempts: u32, message: String },
    TimedOut { attempts: u32, message: String },
    Exhausted { attempts: u32, message: String },
    Cancelled { attempts: u32 },
}

/// Text produced by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSuccess {
    pub text: String,
    /// Attempts used, including the successful one.
    pub attempts: u32,
    pub usage: Option<BackendUsage>,
}

/// Sends prompts to a backend under a [`RetryPolicy`].
///
/// Every call is independent: nothing is cached or deduplicated.
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    policy: RetryPolicy,
    parameters: GenerationParameters,
}

impl GenerationClient {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        policy: RetryPolicy,
        parameters: GenerationParameters,
    ) -> Self {
        Self { backend, policy, parameters }
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn backend_id(&self) -> &str {
        self.backend.backend_id()
    }

    /// Generates text for `prompt`.
    ///
    /// # Errors
    ///
    /// See [`generate_with_cancellation`](Self::generate_with_cancellation).
    pub async fn generate(&self, prompt: &str) -> Result<GenerationSuccess, GenerationError> {
        self.generate_with_cancellation(prompt, &CancellationToken::new()).await
    }

    /// Generates text for `prompt`, stopping early once `cancel` fires.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::BackendRejected`] on a non-transient backend error
    /// - [`GenerationError::Timeout`] when the final failure was a timeout
    /// - [`GenerationError::RetriesExhausted`] when every attempt failed transiently
    /// - [`GenerationError::Cancelled`] when `cancel` fired first
    pub async fn generate_with_cancellation(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<GenerationSuccess, GenerationError> {
        let request = GenerationRequest::new(prompt, self.parameters.clone());
        let deadline = Instant::now() + self.policy.total_timeout;
        let mut state = AttemptState::Idle;

        loop {
            state = match state {
                AttemptState::Idle => AttemptState::Attempting { attempt: 1 },
                AttemptState::Attempting { attempt } => self.attempt(&request, attempt, deadline, cancel).await,
                AttemptState::Backoff { attempt, delay } => {
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
                    tokio::select! {
                        () = cancel.cancelled() => AttemptState::Cancelled { attempts: attempt },
                        () = time::sleep(delay) => AttemptState::Attempting { attempt: attempt + 1 },
                    }
                }
                AttemptState::Succeeded(success) => return Ok(success),
                AttemptState::Rejected { attempts, message } => {
                    return Err(GenerationError::BackendRejected { attempts, message });
                }
                AttemptState::TimedOut { attempts, message } => {
                    return Err(GenerationError::Timeout { attempts, message });
                }
                AttemptState::Exhausted { attempts, message } => {
                    return Err(GenerationError::RetriesExhausted { attempts, message });
                }
                AttemptState::Cancelled { attempts } => return Err(GenerationError::Cancelled { attempts }),
            };
        }
    }

    async fn attempt(
        &self,
        request: &GenerationRequest,
        attempt: u32,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> AttemptState {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return AttemptState::TimedOut {
                attempts: attempt - 1,
                message: format!("overall deadline of {:?} passed", self.policy.total_timeout),
            };
        }
        let budget = self.policy.attempt_timeout.min(remaining);
        debug!(backend_id = %self.backend.backend_id(), attempt, "Sending generation request");

        let outcome = tokio::select! {
            () = cancel.cancelled() => return AttemptState::Cancelled { attempts: attempt },
            outcome = time::timeout(budget, self.backend.generate(request)) => outcome,
        };

        let failure = match outcome {
            Ok(Ok(response)) => {
                info!(attempt, response_len = response.text.len(), "Generation succeeded");
                return AttemptState::Succeeded(GenerationSuccess {
                    text: response.text,
                    attempts: attempt,
                    usage: response.usage,
                });
            }
            Ok(Err(err)) if !err.is_retryable() => {
                warn!(attempt, error = %err, "Backend rejected request");
                return AttemptState::Rejected { attempts: attempt, message: err.message().to_string() };
            }
            Ok(Err(BackendError::Timeout(message))) => RetryableFailure::Timeout(message),
            Ok(Err(err)) => RetryableFailure::Transient(err.message().to_string()),
            Err(_) => RetryableFailure::Timeout(format!("attempt {attempt} exceeded {budget:?}")),
        };
        warn!(attempt, failure = ?failure, "Generation attempt failed");
        self.after_failure(attempt, failure, deadline)
    }

    fn after_failure(&self, attempt: u32, failure: RetryableFailure, deadline: Instant) -> AttemptState {
        let delay = self.policy.backoff_for(attempt);
        let out_of_attempts = attempt >= self.policy.max_attempts;
        let out_of_time = Instant::now() + delay >= deadline;
        if !(out_of_attempts || out_of_time) {
            return AttemptState::Backoff { attempt, delay };
        }
        match failure {
            RetryableFailure::Timeout(message) => AttemptState::TimedOut { attempts: attempt, message },
            RetryableFailure::Transient(message) if out_of_attempts => {
                AttemptState::Exhausted { attempts: attempt, message }
            }
            RetryableFailure::Transient(message) => AttemptState::TimedOut {
                attempts: attempt,
                message: format!("overall deadline would pass during backoff after: {message}"),
            },
        }
    }
}
