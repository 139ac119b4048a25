//! Logging infrastructure for apimock.
//!
//! Installs a `tracing` subscriber that writes either flattened JSON events
//! or pretty, human-readable lines to stdout, and defines the standard event
//! names the server logs with.
//!
//! # Usage
//!
//! ```ignore
//! use apimock_telemetry::{LogFormat, Telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::new()
//!     .with_log_level("debug")
//!     .with_log_format(LogFormat::Pretty);
//!
//! let telemetry = Telemetry::init(config)?;
//! ```

pub mod config;
pub mod logging;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::events;

use thiserror::Error;

/// Telemetry errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize logging.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),

    /// The configured log level is not a valid filter directive.
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),
}

/// Main telemetry handle.
pub struct Telemetry {
    config: TelemetryConfig,
}

impl Telemetry {
    /// Initialize telemetry with the given configuration.
    ///
    /// Installs the global subscriber; fails if one is already installed.
    pub fn init(config: TelemetryConfig) -> Result<Self, TelemetryError> {
        logging::init_logging(&config)?;
        Ok(Self { config })
    }

    /// Get the telemetry configuration.
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }
}
