//! Tracing subscriber setup shared by the binaries.

use std::io;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Builds the filter: `RUST_LOG` when set, otherwise `level` for the
/// multigrade crates and `warn` for everything else.
pub fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,multigrade_core={level},multigrade_models={level},multigrade_orchestrator={level},multigrade={level}"
        ))
    })
}

/// Installs the global subscriber, writing to stderr so that stdout stays
/// free for generated content.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init(level: &str, format: LogFormat) -> Result<(), tracing_subscriber::util::TryInitError> {
    let registry = tracing_subscriber::registry().with(filter(level));
    match format {
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .try_init(),
    }
}
