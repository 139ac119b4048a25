use thiserror::Error;

/// Errors produced while generating a fake value (E3000–E3004).
#[derive(Debug, Error)]
pub enum GenerationError {
    /// E3000: Schemas nested deeper than the configured limit.
    #[error("E3000: schema nesting exceeds {limit} levels at '{path}'")]
    TooDeep { path: String, limit: usize },

    /// E3001: Bounds that no value can satisfy.
    #[error("E3001: unsatisfiable constraints at '{path}': {reason}")]
    Unsatisfiable { path: String, reason: String },

    /// E3002: An `enum` with no members.
    #[error("E3002: empty enum at '{path}'")]
    EmptyEnum { path: String },

    /// E3003: A `$ref` survived resolution.
    #[error("E3003: unresolved $ref at '{path}': {reference}")]
    UnresolvedRef { path: String, reference: String },

    /// E3004: The node is not a schema.
    #[error("E3004: invalid schema at '{path}': {reason}")]
    InvalidSchema { path: String, reason: String },
}
