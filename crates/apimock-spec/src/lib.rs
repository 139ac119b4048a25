//! OpenAPI document pipeline for apimock.
//!
//! Loads a YAML or JSON document, resolves every `$ref`, normalizes the
//! tree and extracts the per-operation view the compiler consumes:
//!
//! ```text
//! load_document -> RawDocument -> resolve -> ResolvedDocument -> normalize -> Document
//! ```

mod error;
mod loader;
mod model;
mod normalizer;
mod operation;
mod resolver;

use std::path::Path;

pub use error::{LoadError, SpecError, StructuralError};
pub use loader::{load_document, load_str};
pub use model::{
    merge_all_of, Document, PathItemKey, RawDocument, ResolvedDocument, SchemaNode, HTTP_METHODS,
};
pub use normalizer::normalize;
pub use operation::{extract_operations, MediaSchema, Operation, Parameter, SuccessResponse};
pub use resolver::{resolve, MAX_REF_DEPTH};

/// Load, resolve and normalize a document file in one step.
pub fn load_and_normalize(path: &Path) -> Result<Document, SpecError> {
    let raw = load_document(path)?;
    let resolved = resolve(raw)?;
    Ok(normalize(resolved))
}

/// Like [`load_and_normalize`], from an in-memory string.
pub fn parse_and_normalize(input: &str) -> Result<Document, SpecError> {
    let raw = load_str(input)?;
    let resolved = resolve(raw)?;
    Ok(normalize(resolved))
}
