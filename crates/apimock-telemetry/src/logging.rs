//! Structured logging with JSON or pretty output.
//!
//! Events go to stdout; JSON events are flattened so every field sits at the
//! top level of the line.

use crate::{LogFormat, TelemetryConfig, TelemetryError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the logging subsystem.
///
/// Sets up tracing-subscriber with either JSON or pretty format. `RUST_LOG`
/// wins over the configured log level when set.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(config)?;

    match config.log_format {
        LogFormat::Json => init_json_logging(filter),
        LogFormat::Pretty => init_pretty_logging(filter),
    }
}

fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.log_level)
            .map_err(|_| TelemetryError::InvalidLevel(config.log_level.clone())),
    }
}

/// Initialize JSON logging for production.
fn init_json_logging(filter: EnvFilter) -> Result<(), TelemetryError> {
    let json_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_file(false)
        .with_line_number(false)
        .flatten_event(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

/// Initialize pretty logging for development.
fn init_pretty_logging(filter: EnvFilter) -> Result<(), TelemetryError> {
    let pretty_layer = fmt::layer()
        .pretty()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(pretty_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

/// Standard log event names.
pub mod events {
    /// Server is starting up.
    pub const STARTUP: &str = "startup";

    /// Server is shutting down.
    pub const SHUTDOWN: &str = "shutdown";

    /// Document has been loaded, resolved and normalized.
    pub const DOCUMENT_LOADED: &str = "document_loaded";

    /// Compilation reported a non-fatal issue.
    pub const COMPILE_WARNING: &str = "compile_warning";

    /// A mock route has been registered.
    pub const ROUTE_REGISTERED: &str = "route_registered";

    /// Server is listening on a port.
    pub const LISTENING: &str = "listening";

    /// Request has been completed.
    pub const REQUEST_COMPLETED: &str = "request_completed";

    /// Request validation failed.
    pub const VALIDATION_FAILURE: &str = "validation_failure";

    /// Fake response generation failed or timed out.
    pub const GENERATION_ERROR: &str = "generation_error";
}

/// Helper macros for structured logging with standard fields.
///
/// These wrap the tracing macros to ensure consistent field naming.
#[macro_export]
macro_rules! log_startup {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::STARTUP,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_shutdown {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::SHUTDOWN,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_document_loaded {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::DOCUMENT_LOADED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_compile_warning {
    ($($field:tt)*) => {
        tracing::warn!(
            event = $crate::logging::events::COMPILE_WARNING,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_route_registered {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::ROUTE_REGISTERED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_listening {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::LISTENING,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_request_completed {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::REQUEST_COMPLETED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_validation_failure {
    ($($field:tt)*) => {
        tracing::warn!(
            event = $crate::logging::events::VALIDATION_FAILURE,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_generation_error {
    ($($field:tt)*) => {
        tracing::error!(
            event = $crate::logging::events::GENERATION_ERROR,
            $($field)*
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: We can't easily test logging initialization multiple times
    // in the same test process due to global subscriber state.
    // These tests verify the configuration logic.

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("PRETTY"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("invalid"), None);
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        // Only meaningful when RUST_LOG is unset.
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = TelemetryConfig::new().with_log_level("apimock=loud");
        assert!(matches!(
            build_filter(&config),
            Err(TelemetryError::InvalidLevel(_))
        ));
        assert!(build_filter(&TelemetryConfig::new().with_log_level("debug")).is_ok());
    }
}
