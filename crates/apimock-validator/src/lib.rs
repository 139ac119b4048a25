//! Request validation for apimock.
//!
//! Compiles request-body schemas into lenient JSON Schema validators (unknown
//! formats are ignored) and turns validation failures into the JSON error
//! payloads the mock server returns.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Message used in the payload of every rejected request.
pub const VALIDATION_FAILED_MESSAGE: &str = "Request failed to validate";

/// A schema that could not be compiled into a validator.
#[derive(Debug, Error)]
#[error("invalid schema: {0}")]
pub struct SchemaCompileError(String);

/// One reason a request body was rejected.
///
/// Serialized with the field names clients of the mock expect in `meta`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFault {
    /// JSON pointer into the request body, empty for the root.
    pub instance_path: String,
    /// JSON pointer into the schema, starting with `#`.
    pub schema_path: String,
    /// The schema keyword that failed, e.g. `required`.
    pub keyword: String,
    pub message: String,
}

impl ValidationFault {
    fn body(keyword: &str, message: impl Into<String>) -> Self {
        Self {
            instance_path: String::new(),
            schema_path: "#".into(),
            keyword: keyword.into(),
            message: message.into(),
        }
    }
}

/// Compile a JSON schema with format validation enabled and unknown formats
/// ignored.
fn compile_schema_lenient(schema: &Value) -> Result<jsonschema::Validator, SchemaCompileError> {
    jsonschema::options()
        .should_validate_formats(true)
        .should_ignore_unknown_formats(true)
        .build(schema)
        .map_err(|e| SchemaCompileError(e.to_string()))
}

/// Rewrite OpenAPI 3.0 schema spellings into their JSON Schema equivalents:
/// boolean `exclusiveMinimum`/`exclusiveMaximum` become numeric bounds and
/// `nullable: true` adds `null` to `type`.
pub fn to_json_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(obj) => {
            let mut out: Map<String, Value> = obj
                .iter()
                .map(|(k, v)| (k.clone(), to_json_schema(v)))
                .collect();
            for (exclusive, inclusive) in [
                ("exclusiveMinimum", "minimum"),
                ("exclusiveMaximum", "maximum"),
            ] {
                match out.get(exclusive) {
                    Some(Value::Bool(true)) => {
                        if let Some(bound) = out.remove(inclusive) {
                            out.insert(exclusive.to_string(), bound);
                        } else {
                            out.remove(exclusive);
                        }
                    }
                    Some(Value::Bool(false)) => {
                        out.remove(exclusive);
                    }
                    _ => {}
                }
            }
            if out.get("nullable") == Some(&Value::Bool(true)) {
                if let Some(Value::String(ty)) = out.get("type") {
                    let types = Value::Array(vec![Value::String(ty.clone()), "null".into()]);
                    out.insert("type".to_string(), types);
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(to_json_schema).collect()),
        other => other.clone(),
    }
}

/// Compiled validator for one schema.
pub struct SchemaValidator {
    validator: jsonschema::Validator,
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator").finish_non_exhaustive()
    }
}

impl SchemaValidator {
    /// Compile a schema written in either OpenAPI 3.0 or 3.1 style.
    pub fn compile(schema: &Value) -> Result<Self, SchemaCompileError> {
        Ok(Self {
            validator: compile_schema_lenient(&to_json_schema(schema))?,
        })
    }

    /// Validate an already-parsed value. All faults are reported.
    pub fn validate_value(&self, instance: &Value) -> Result<(), Vec<ValidationFault>> {
        let faults: Vec<ValidationFault> = self
            .validator
            .iter_errors(instance)
            .map(|error| {
                let schema_path = error.schema_path.to_string();
                let keyword = schema_path
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                ValidationFault {
                    instance_path: error.instance_path.to_string(),
                    schema_path: format!("#{}", schema_path),
                    keyword,
                    message: error.to_string(),
                }
            })
            .collect();

        if faults.is_empty() {
            Ok(())
        } else {
            Err(faults)
        }
    }

    /// Decode a raw request body and validate it.
    ///
    /// An empty body validates as `{}`. Undecodable bodies are reported as a
    /// single fault rather than an error.
    pub fn validate_body(
        &self,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<(), Vec<ValidationFault>> {
        let instance = decode_body(content_type, body).map_err(|fault| vec![fault])?;
        self.validate_value(&instance)
    }
}

/// Turn a request body into a JSON value according to its content type.
///
/// `application/x-www-form-urlencoded` becomes an object of strings; every
/// other type is parsed as JSON.
pub fn decode_body(content_type: Option<&str>, body: &[u8]) -> Result<Value, ValidationFault> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }

    let ct = content_type.unwrap_or("application/json");
    let base_ct = ct.split(';').next().unwrap_or(ct).trim();

    if base_ct.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        return Ok(decode_form(body));
    }

    serde_json::from_slice(body)
        .map_err(|e| ValidationFault::body("type", format!("invalid JSON: {}", e)))
}

/// Parse `a=1&b=two` into `{"a": "1", "b": "two"}`. Later duplicates win.
fn decode_form(body: &[u8]) -> Value {
    let fields: Map<String, Value> = form_urlencoded::parse(body)
        .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
        .collect();
    Value::Object(fields)
}

/// JSON error payload: `{"error": {"message": ..., "meta"?: ..., "stack"?: ...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Vec<ValidationFault>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                meta: None,
                stack: None,
            },
        }
    }

    pub fn validation_failed(faults: Vec<ValidationFault>) -> Self {
        let mut response = Self::new(VALIDATION_FAILED_MESSAGE);
        response.error.meta = Some(faults);
        response
    }

    pub fn not_found() -> Self {
        Self::new("Not found")
    }

    /// Attach a stack (the error's source chain, one entry per line). Only
    /// done in dev mode.
    pub fn with_stack(mut self, stack: &[String]) -> Self {
        self.error.stack = Some(stack.join("\n"));
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"error":{"message":"Serialization error"}}"#.into())
    }
}
