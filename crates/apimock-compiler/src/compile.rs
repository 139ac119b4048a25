//! Turns a normalized document into compiled operations.

use std::collections::{HashMap, HashSet};

use apimock_router::{pattern_shape, template_to_pattern};
use apimock_spec::{extract_operations, Document, Operation};
use apimock_validator::SchemaValidator;
use serde_json::Value;

use crate::error::{CompileError, CompileWarning};

/// W2001: two operations share an identifier.
pub const DUPLICATE_ID_WARNING: &str = "W2001";
/// W2002: several 2xx responses declared; the lowest code was chosen.
pub const MULTIPLE_SUCCESS_WARNING: &str = "W2002";
/// W2003: a response schema could not be compiled; responses are not checked.
pub const RESPONSE_SCHEMA_WARNING: &str = "W2003";

/// Options for compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Fail instead of warning when two operations share an identifier.
    pub strict_operation_ids: bool,
}

/// One operation, ready to serve.
#[derive(Debug)]
pub struct CompiledOperation {
    pub operation: Operation,
    /// Validator for the request body, when a request schema is declared.
    pub request_validator: Option<SchemaValidator>,
    /// Schema the mock response is generated from.
    pub response_schema: Option<Value>,
    /// Validator for generated responses, used as a self-check in dev mode.
    pub response_validator: Option<SchemaValidator>,
}

impl CompiledOperation {
    /// Status code the mock answers with.
    pub fn status(&self) -> u16 {
        self.operation.response.status
    }

    /// Content type of the mock response.
    pub fn response_content_type(&self) -> Option<&str> {
        self.operation
            .response
            .content
            .as_ref()
            .map(|media| media.content_type.as_str())
    }
}

/// Result of compilation including any warnings.
#[derive(Debug)]
pub struct CompileResult {
    /// Operations in document declaration order.
    pub operations: Vec<CompiledOperation>,
    /// Non-fatal issues, in the order they were found.
    pub warnings: Vec<CompileWarning>,
}

/// Compile every operation of a normalized document.
pub fn compile(doc: &Document, options: &CompileOptions) -> Result<CompileResult, CompileError> {
    let mut warnings: Vec<CompileWarning> = Vec::new();
    let mut operations: Vec<CompiledOperation> = Vec::new();
    let mut seen_structural: HashMap<(String, String), String> = HashMap::new();
    let mut seen_identifiers: HashMap<String, String> = HashMap::new();

    for op in extract_operations(doc)? {
        let location = op.label();

        validate_path_template(&op.path, &location)?;

        // Same method and same router shape once parameter names are erased.
        let shape = pattern_shape(&template_to_pattern(&op.path));
        let structural_key = (shape, op.method.clone());
        if let Some(other_path) = seen_structural.get(&structural_key) {
            return Err(CompileError::RoutingConflict(format!(
                "'{}' and '{}' both match {} requests for the same paths",
                other_path, op.path, op.method
            )));
        }
        seen_structural.insert(structural_key, op.path.clone());

        if let Some(id) = op.identifier() {
            if let Some(first) = seen_identifiers.get(id) {
                let detail = format!("first at {}, duplicate at {}", first, location);
                if options.strict_operation_ids {
                    return Err(CompileError::DuplicateOperationId(id.to_string(), detail));
                }
                warnings.push(CompileWarning {
                    code: DUPLICATE_ID_WARNING.to_string(),
                    message: format!("duplicate operation identifier '{}': {}", id, detail),
                    location: Some(location.clone()),
                });
            }
            seen_identifiers.insert(id.to_string(), location.clone());
        }

        if op.success_statuses.len() > 1 {
            warnings.push(CompileWarning {
                code: MULTIPLE_SUCCESS_WARNING.to_string(),
                message: format!(
                    "several success responses declared, using {}",
                    op.response.status
                ),
                location: Some(location.clone()),
            });
        }

        let request_validator = match &op.request_body {
            Some(media) => Some(SchemaValidator::compile(&media.schema).map_err(|e| {
                CompileError::InvalidRequestSchema {
                    location: location.clone(),
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };

        let response_schema = op.response.content.as_ref().map(|media| media.schema.clone());
        let response_validator = match &response_schema {
            Some(schema) => match SchemaValidator::compile(schema) {
                Ok(validator) => Some(validator),
                Err(e) => {
                    warnings.push(CompileWarning {
                        code: RESPONSE_SCHEMA_WARNING.to_string(),
                        message: format!("response schema not checkable: {}", e),
                        location: Some(location.clone()),
                    });
                    None
                }
            },
            None => None,
        };

        tracing::debug!(
            operation = %location,
            validates_request = request_validator.is_some(),
            has_response_schema = response_schema.is_some(),
            "compiled operation"
        );

        operations.push(CompiledOperation {
            operation: op,
            request_validator,
            response_schema,
            response_validator,
        });
    }

    Ok(CompileResult {
        operations,
        warnings,
    })
}

/// Check a path template: it starts with `/`, and every `{name}` is closed,
/// non-empty, made of alphanumerics, `_` or `-`, and unique in the path.
fn validate_path_template(path: &str, location: &str) -> Result<(), CompileError> {
    let invalid =
        |reason: String| CompileError::InvalidPathTemplate(format!("{} - {}", location, reason));

    if !path.starts_with('/') {
        return Err(invalid("path must start with '/'".to_string()));
    }

    let mut names: HashSet<&str> = HashSet::new();
    let mut rest = path;
    while let Some(brace) = rest.find(|c| c == '{' || c == '}') {
        if rest[brace..].starts_with('}') {
            return Err(invalid("unmatched closing brace".to_string()));
        }
        let after = &rest[brace + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| invalid("unclosed brace".to_string()))?;
        let name = &after[..close];

        if name.is_empty() {
            return Err(invalid("empty parameter name".to_string()));
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !c.is_alphanumeric() && *c != '_' && *c != '-')
        {
            return Err(invalid(format!("invalid character '{}' in parameter name", bad)));
        }
        if !names.insert(name) {
            return Err(invalid(format!("duplicate parameter '{}'", name)));
        }
        rest = &after[close + 1..];
    }

    Ok(())
}
