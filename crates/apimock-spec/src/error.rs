use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while reading a document from storage (E1000–E1002).
#[derive(Debug, Error)]
pub enum LoadError {
    /// E1000: The file could not be read.
    #[error("E1000: cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// E1001: The root has no `openapi` field.
    #[error("E1001: not an OpenAPI document (missing 'openapi' field)")]
    NotOpenApi,

    /// E1001: The `openapi` field names a version other than 3.x.
    #[error("E1001: unsupported OpenAPI version: {0} (only 3.x supported)")]
    UnsupportedVersion(String),

    /// E1002: YAML/JSON parse error.
    #[error("E1002: parse error: {0}")]
    Parse(String),
}

/// Errors produced while resolving or walking the document tree (E1003–E1006).
#[derive(Debug, Error)]
pub enum StructuralError {
    /// E1003: A `$ref` points at nothing, or outside the document.
    #[error("E1003: unresolved $ref: {0}")]
    UnresolvedRef(String),

    /// E1004: A `$ref` chain loops back on itself.
    #[error("E1004: circular $ref detected: {0}")]
    CircularRef(String),

    /// E1005: A `$ref` chain is nested deeper than the resolver allows.
    #[error("E1005: $ref nesting exceeds {limit} levels at {reference}")]
    TooDeep { reference: String, limit: usize },

    /// E1006: A path item or operation has the wrong shape.
    #[error("E1006: malformed document: {0}")]
    Malformed(String),
}

/// Any startup failure of the document pipeline.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Structural(#[from] StructuralError),
}
