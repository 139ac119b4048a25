use std::error::Error as StdError;
use std::path::PathBuf;
use std::time::Duration;

use hyper::StatusCode;
use thiserror::Error;

use apimock_compiler::CompileError;
use apimock_faker::GenerationError;
use apimock_spec::SpecError;

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    /// An operation override names an identifier no operation has.
    #[error("override for unknown operation '{0}'")]
    UnknownOverride(String),
}

/// Request-time failures. Always recovered into a JSON error response.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The fake value generator rejected the response schema.
    #[error("failed to generate response: {0}")]
    Generation(#[from] GenerationError),

    /// Generation did not finish within the configured budget.
    #[error("response generation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The blocking generation task panicked or was cancelled.
    #[error("response generation task failed: {0}")]
    Task(String),

    /// The request body could not be read.
    #[error("failed to read request body: {0}")]
    Body(String),

    /// The request body exceeded the configured limit.
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    /// A static asset could not be served.
    #[error("cannot serve asset '{}': {source}", path.display())]
    Asset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A generated body could not be serialized.
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl HandlerError {
    /// HTTP status the fallback response is sent with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Asset { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The error followed by its chain of sources, one message per entry.
    pub fn stack(&self) -> Vec<String> {
        let mut stack = vec![self.to_string()];
        let mut source = self.source();
        while let Some(err) = source {
            stack.push(err.to_string());
            source = err.source();
        }
        stack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(
            HandlerError::Timeout(Duration::from_millis(5)).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            HandlerError::Task("panicked".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            HandlerError::BodyTooLarge(16).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        let missing = HandlerError::Asset {
            path: PathBuf::from("app.js"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn stack_follows_sources() {
        let err = HandlerError::Asset {
            path: PathBuf::from("app.js"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let stack = err.stack();
        assert_eq!(stack.len(), 2);
        assert!(stack[0].contains("app.js"));
        assert_eq!(stack[1], "denied");
    }
}
