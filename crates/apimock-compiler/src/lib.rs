//! Compiles a normalized OpenAPI document into servable operations.
//!
//! Selects request and response schemas, builds lenient request validators
//! and checks the document for identifier collisions and routing conflicts
//! before anything is registered.

pub mod compile;
pub mod error;

pub use compile::{
    compile, CompileOptions, CompileResult, CompiledOperation, DUPLICATE_ID_WARNING,
    MULTIPLE_SUCCESS_WARNING, RESPONSE_SCHEMA_WARNING,
};
pub use error::{CompileError, CompileWarning};
// Operation types from apimock-spec
pub use apimock_spec::{MediaSchema, Operation, Parameter, SuccessResponse};
