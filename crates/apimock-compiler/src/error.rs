use serde::Serialize;
use thiserror::Error;

/// Errors produced during compilation (E2000–E2003).
#[derive(Debug, Error)]
pub enum CompileError {
    /// Document loading or resolution failed.
    #[error(transparent)]
    Spec(#[from] apimock_spec::SpecError),

    /// E2000: A request schema could not be compiled into a validator.
    #[error("E2000: invalid request schema for {location}: {reason}")]
    InvalidRequestSchema { location: String, reason: String },

    /// E2001: Two operations share an identifier (strict mode only).
    #[error("E2001: duplicate operation identifier '{0}': {1}")]
    DuplicateOperationId(String, String),

    /// E2002: Two operations would answer the same method and path shape.
    #[error("E2002: routing conflict: {0}")]
    RoutingConflict(String),

    /// E2003: A path template is malformed.
    #[error("E2003: invalid path template: {0}")]
    InvalidPathTemplate(String),
}

impl From<apimock_spec::StructuralError> for CompileError {
    fn from(err: apimock_spec::StructuralError) -> Self {
        Self::Spec(err.into())
    }
}

/// A non-fatal issue found while compiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileWarning {
    /// Warning code, e.g. `W2001`.
    pub code: String,
    pub message: String,
    /// `METHOD /path` of the operation concerned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl std::fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {} ({})", self.code, self.message, location),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}
