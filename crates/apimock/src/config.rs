use std::path::PathBuf;
use std::time::Duration;

use apimock_faker::FakerOptions;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8001;

/// Default request body limit (1 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Runtime configuration for the mock server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Include error source chains (`stack`) in 500 responses and check
    /// generated responses against their schema.
    pub dev_mode: bool,
    /// Fail startup when two operations share an identifier.
    pub strict_operation_ids: bool,
    /// Directory served under the docs assets prefix.
    pub assets_dir: Option<PathBuf>,
    /// Upper bound on fake response generation per request.
    pub generation_timeout: Duration,
    /// Request bodies larger than this many bytes are rejected with 413.
    pub max_body_size: usize,
    pub faker: FakerOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            dev_mode: false,
            strict_operation_ids: false,
            assets_dir: None,
            generation_timeout: Duration::from_millis(5000),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            faker: FakerOptions::default(),
        }
    }
}
