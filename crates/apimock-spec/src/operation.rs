//! Per-operation view of a normalized document.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::StructuralError;
use crate::model::{Document, PathItemKey};

/// A single declared (path, method) pair with its selected schemas.
#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    /// Path template as declared, e.g. `/pets/{id}`.
    pub path: String,
    /// Uppercase HTTP method.
    pub method: String,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    /// Inherited path-level parameters first, then the operation's own.
    pub parameters: Vec<Parameter>,
    pub request_body: Option<MediaSchema>,
    pub response: SuccessResponse,
    /// Every numeric 2xx code the operation declares, in declaration order.
    pub success_statuses: Vec<u16>,
}

impl Operation {
    /// `operationId`, falling back to `summary`.
    pub fn identifier(&self) -> Option<&str> {
        self.operation_id.as_deref().or(self.summary.as_deref())
    }

    /// Human-readable label for logs, e.g. `GET /pets/{id}`.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Parameter {
    pub name: String,
    /// `path`, `query`, `header` or `cookie`.
    pub location: String,
    pub required: bool,
    pub schema: Option<Value>,
}

/// A schema attached to one content type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaSchema {
    pub content_type: String,
    pub schema: Value,
}

/// The response the mock will produce.
#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse {
    pub status: u16,
    /// `None` when no success entry or no content is declared.
    pub content: Option<MediaSchema>,
}

impl Default for SuccessResponse {
    fn default() -> Self {
        Self {
            status: 200,
            content: None,
        }
    }
}

/// Walk every path item and collect its operations in declaration order.
///
/// Path-item metadata and `x-` keys are skipped silently; keys that are
/// neither are skipped with a warning.
pub fn extract_operations(doc: &Document) -> Result<Vec<Operation>, StructuralError> {
    let mut operations = Vec::new();

    for (path, item) in doc.paths() {
        let item = item.as_object().ok_or_else(|| {
            StructuralError::Malformed(format!("path item for '{}' must be a mapping", path))
        })?;

        for (key, value) in item {
            match PathItemKey::classify(key) {
                PathItemKey::Operation => {}
                PathItemKey::PathField | PathItemKey::Extension => continue,
                PathItemKey::Unknown => {
                    tracing::warn!(path = %path, key = %key, "skipping unknown path item key");
                    continue;
                }
            }

            let op = value.as_object().ok_or_else(|| {
                StructuralError::Malformed(format!(
                    "operation {} {} must be a mapping",
                    key.to_uppercase(),
                    path
                ))
            })?;
            operations.push(parse_operation(path, key, op));
        }
    }

    Ok(operations)
}

fn parse_operation(path: &str, method: &str, op: &Map<String, Value>) -> Operation {
    let text = |field: &str| op.get(field).and_then(Value::as_str).map(str::to_string);

    let (response, success_statuses) = op
        .get("responses")
        .and_then(Value::as_object)
        .map(select_response)
        .unwrap_or_default();

    Operation {
        path: path.to_string(),
        method: method.to_uppercase(),
        operation_id: text("operationId"),
        summary: text("summary"),
        parameters: parse_parameters(op),
        request_body: op
            .get("requestBody")
            .and_then(|body| body.get("content"))
            .and_then(first_media_schema),
        response,
        success_statuses,
    }
}

fn parse_parameters(op: &Map<String, Value>) -> Vec<Parameter> {
    op.get("parameters")
        .and_then(Value::as_array)
        .map(|params| {
            params
                .iter()
                .filter_map(|item| {
                    let param = item.as_object()?;
                    Some(Parameter {
                        name: param.get("name")?.as_str()?.to_string(),
                        location: param.get("in")?.as_str()?.to_string(),
                        required: param
                            .get("required")
                            .and_then(Value::as_bool)
                            .unwrap_or(false),
                        schema: param.get("schema").cloned(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Pick the success response: the lowest numeric code in 200..=299, else a
/// `2XX` range entry.
fn select_response(responses: &Map<String, Value>) -> (SuccessResponse, Vec<u16>) {
    let success: Vec<u16> = responses
        .keys()
        .filter_map(|code| code.parse::<u16>().ok())
        .filter(|code| (200..=299).contains(code))
        .collect();

    let chosen = success
        .iter()
        .min()
        .map(|code| (*code, responses.get(&code.to_string())))
        .or_else(|| {
            responses
                .iter()
                .find(|(code, _)| code.eq_ignore_ascii_case("2XX"))
                .map(|(_, entry)| (200, Some(entry)))
        });

    let response = match chosen {
        Some((status, entry)) => SuccessResponse {
            status,
            content: entry
                .and_then(|entry| entry.get("content"))
                .and_then(first_media_schema),
        },
        None => SuccessResponse::default(),
    };
    (response, success)
}

/// The schema of the first declared content type.
fn first_media_schema(content: &Value) -> Option<MediaSchema> {
    let (content_type, media) = content.as_object()?.iter().next()?;
    Some(MediaSchema {
        content_type: content_type.clone(),
        schema: media.get("schema")?.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_str;
    use crate::normalizer::normalize;
    use crate::resolver::resolve;

    fn operations(yaml: &str) -> Vec<Operation> {
        let doc = normalize(resolve(load_str(yaml).unwrap()).unwrap());
        extract_operations(&doc).unwrap()
    }

    const PETSTORE: &str = r##"
openapi: "3.0.3"
info:
  title: Petstore
  version: "1.0.0"
components:
  schemas:
    Pet:
      type: object
      required: [id, name]
      properties:
        id:
          type: integer
        name:
          type: string
paths:
  /pets/{id}:
    parameters:
      - name: id
        in: path
        required: true
        schema:
          type: integer
    x-owner: team-pets
    get:
      operationId: getPet
      responses:
        "200":
          content:
            application/json:
              schema:
                $ref: "#/components/schemas/Pet"
            application/xml:
              schema:
                type: string
  /pets:
    post:
      summary: createPet
      requestBody:
        content:
          application/json:
            schema:
              type: object
              required: [name]
          text/plain:
            schema:
              type: string
      responses:
        "201":
          description: created
"##;

    #[test]
    fn extract_petstore_operations() {
        let ops = operations(PETSTORE);
        assert_eq!(ops.len(), 2);

        let get = &ops[0];
        assert_eq!(get.method, "GET");
        assert_eq!(get.path, "/pets/{id}");
        assert_eq!(get.identifier(), Some("getPet"));
        assert_eq!(get.parameters.len(), 1);
        assert!(get.parameters[0].required);
        let content = get.response.content.as_ref().unwrap();
        assert_eq!(content.content_type, "application/json");
        assert_eq!(content.schema["key"], "Pet");
        assert_eq!(get.response.status, 200);

        let post = &ops[1];
        assert_eq!(post.identifier(), Some("createPet"));
        let body = post.request_body.as_ref().unwrap();
        assert_eq!(body.content_type, "application/json");
        assert_eq!(body.schema["required"][0], "name");
        assert_eq!(post.response.status, 201);
        assert!(post.response.content.is_none());
    }

    #[test]
    fn lowest_success_code_wins() {
        let ops = operations(
            r#"
openapi: "3.0.0"
paths:
  /things:
    get:
      responses:
        "404":
          content:
            application/json:
              schema: {type: object}
        "202":
          content:
            application/json:
              schema: {type: string}
        "200":
          content:
            application/json:
              schema: {type: integer}
"#,
        );
        let op = &ops[0];
        assert_eq!(op.response.status, 200);
        assert_eq!(op.response.content.as_ref().unwrap().schema["type"], "integer");
        assert_eq!(op.success_statuses, vec![202, 200]);
    }

    #[test]
    fn range_key_is_fallback() {
        let ops = operations(
            r#"
openapi: "3.0.0"
paths:
  /things:
    get:
      responses:
        2XX:
          content:
            application/json:
              schema: {type: boolean}
"#,
        );
        let response = &ops[0].response;
        assert_eq!(response.status, 200);
        assert_eq!(response.content.as_ref().unwrap().schema["type"], "boolean");
    }

    #[test]
    fn no_success_entry_means_no_schema() {
        let ops = operations(
            r#"
openapi: "3.0.0"
paths:
  /things:
    delete:
      responses:
        "404":
          description: missing
    head: {}
"#,
        );
        assert!(ops[0].response.content.is_none());
        assert_eq!(ops[0].response.status, 200);
        assert!(ops[1].response.content.is_none());
        assert!(ops[1].identifier().is_none());
    }

    #[test]
    fn non_http_keys_are_not_operations() {
        let ops = operations(
            r#"
openapi: "3.0.0"
paths:
  /things:
    summary: things
    description: all the things
    x-rate-limit: 10
    fetch: {}
    get: {}
"#,
        );
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].method, "GET");
    }

    #[test]
    fn malformed_path_item_is_structural_error() {
        let doc = normalize(
            resolve(load_str("openapi: \"3.0.0\"\npaths:\n  /x: 3\n").unwrap()).unwrap(),
        );
        let err = extract_operations(&doc).unwrap_err();
        assert!(matches!(err, StructuralError::Malformed(_)), "got {:?}", err);
    }
}
