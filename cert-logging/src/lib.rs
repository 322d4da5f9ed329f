//! Logging for CertGate
//!
//! Installs the global `tracing` subscriber and provides [`SubjectRedactor`]
//! for scrubbing personal data out of certificate subjects before they are
//! logged.
//!
//! `RUST_LOG` always takes precedence over the configured level.

pub mod config;
pub mod error;
pub mod redactor;

pub use config::*;
pub use error::*;
pub use redactor::*;

use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Fails when the filter directives do not parse or a global subscriber is
/// already set.
pub fn init(config: &LoggerConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directives()))
        .map_err(|e| LoggingError::Filter(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(config.ansi)
                    .with_level(true),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .try_init(),
    }
    .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}
