//! `$ref` resolution: every reference node is replaced by a deep copy of its
//! target, so later stages see a self-contained tree.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::StructuralError;
use crate::model::{RawDocument, ResolvedDocument, SchemaNode};
use crate::normalizer::stamp_key;

/// Maximum number of nested reference inlines along one resolution chain.
pub const MAX_REF_DEPTH: usize = 64;

const SCHEMA_POINTER_PREFIX: &str = "#/components/schemas/";

/// Resolve every `$ref` in the document.
///
/// Only local references (`#/...`) are supported. Reference cycles fail with
/// [`StructuralError::CircularRef`] instead of recursing forever.
pub fn resolve(raw: RawDocument) -> Result<ResolvedDocument, StructuralError> {
    let root = resolve_value(&raw.root, &raw.root, &mut HashSet::new())?;
    Ok(ResolvedDocument { root })
}

/// Look up a JSON pointer like `#/components/schemas/User` from the root.
fn lookup_pointer<'a>(root: &'a Value, pointer: &str) -> Option<&'a Value> {
    let path = pointer.strip_prefix('#')?;
    if path.is_empty() {
        return Some(root);
    }
    let path = path.strip_prefix('/')?;

    let mut current = root;
    for segment in path.split('/') {
        let unescaped = segment.replace("~1", "/").replace("~0", "~");
        current = match current {
            Value::Object(obj) => obj.get(&unescaped)?,
            Value::Array(items) => items.get(unescaped.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Recursively resolve all `$ref` pointers in a value.
///
/// `chain` tracks the references currently being inlined to detect cycles.
fn resolve_value(
    value: &Value,
    root: &Value,
    chain: &mut HashSet<String>,
) -> Result<Value, StructuralError> {
    match value {
        Value::Object(obj) => match SchemaNode::classify(value) {
            SchemaNode::Reference(pointer) => resolve_reference(pointer, root, chain),
            SchemaNode::Composition(_) | SchemaNode::Schema(_) => {
                let mut resolved = Map::with_capacity(obj.len());
                for (key, val) in obj {
                    resolved.insert(key.clone(), resolve_value(val, root, chain)?);
                }
                Ok(Value::Object(resolved))
            }
            SchemaNode::Boolean(_) | SchemaNode::Invalid(_) => Ok(value.clone()),
        },
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_value(item, root, chain))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn resolve_reference(
    pointer: &str,
    root: &Value,
    chain: &mut HashSet<String>,
) -> Result<Value, StructuralError> {
    if chain.len() >= MAX_REF_DEPTH {
        return Err(StructuralError::TooDeep {
            reference: pointer.to_string(),
            limit: MAX_REF_DEPTH,
        });
    }
    if !chain.insert(pointer.to_string()) {
        return Err(StructuralError::CircularRef(pointer.to_string()));
    }

    let target = lookup_pointer(root, pointer)
        .ok_or_else(|| StructuralError::UnresolvedRef(pointer.to_string()))?;
    let mut resolved = resolve_value(target, root, chain)?;
    chain.remove(pointer);

    // An inlined named schema keeps its declared name.
    if let Some(name) = pointer.strip_prefix(SCHEMA_POINTER_PREFIX) {
        if !name.contains('/') {
            stamp_key(&mut resolved, &name.replace("~1", "/").replace("~0", "~"), false);
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_str;
    use serde_json::json;

    fn resolve_yaml(yaml: &str) -> Result<ResolvedDocument, StructuralError> {
        resolve(load_str(yaml).unwrap())
    }

    #[test]
    fn resolve_ref_in_request_body() {
        let yaml = r##"
openapi: "3.1.0"
components:
  schemas:
    CreatePet:
      type: object
      required: [name]
      properties:
        name:
          type: string
paths:
  /pets:
    post:
      requestBody:
        content:
          application/json:
            schema:
              $ref: "#/components/schemas/CreatePet"
"##;
        let doc = resolve_yaml(yaml).unwrap();
        let schema = doc
            .as_value()
            .pointer("/paths/~1pets/post/requestBody/content/application~1json/schema")
            .unwrap();
        assert!(schema.get("$ref").is_none());
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["name"]));
        assert_eq!(schema["key"], "CreatePet");
    }

    #[test]
    fn resolve_nested_ref() {
        let yaml = r##"
openapi: "3.1.0"
components:
  schemas:
    Address:
      type: object
      properties:
        street:
          type: string
    User:
      type: object
      properties:
        address:
          $ref: "#/components/schemas/Address"
paths:
  /users:
    get:
      responses:
        "200":
          content:
            application/json:
              schema:
                $ref: "#/components/schemas/User"
"##;
        let doc = resolve_yaml(yaml).unwrap();
        let schema = doc
            .as_value()
            .pointer("/paths/~1users/get/responses/200/content/application~1json/schema")
            .unwrap();
        let address = &schema["properties"]["address"];
        assert!(address.get("$ref").is_none());
        assert_eq!(address["properties"]["street"]["type"], "string");
        assert_eq!(address["key"], "Address");
    }

    #[test]
    fn resolve_non_schema_refs() {
        let yaml = r##"
openapi: "3.1.0"
components:
  parameters:
    Limit:
      name: limit
      in: query
      schema:
        type: integer
paths:
  /pets:
    get:
      parameters:
        - $ref: "#/components/parameters/Limit"
"##;
        let doc = resolve_yaml(yaml).unwrap();
        let param = doc.as_value().pointer("/paths/~1pets/get/parameters/0").unwrap();
        assert_eq!(param["name"], "limit");
        assert!(param.get("key").is_none());
    }

    #[test]
    fn shared_target_is_not_a_cycle() {
        let yaml = r##"
openapi: "3.1.0"
components:
  schemas:
    Id:
      type: integer
    Pair:
      type: object
      properties:
        left:
          $ref: "#/components/schemas/Id"
        right:
          $ref: "#/components/schemas/Id"
"##;
        let doc = resolve_yaml(yaml).unwrap();
        let pair = doc.as_value().pointer("/components/schemas/Pair").unwrap();
        assert_eq!(pair["properties"]["left"]["type"], "integer");
        assert_eq!(pair["properties"]["right"]["type"], "integer");
    }

    #[test]
    fn unresolved_ref_returns_error() {
        let yaml = r##"
openapi: "3.1.0"
paths:
  /pets:
    get:
      parameters:
        - name: id
          in: query
          schema:
            $ref: "#/components/schemas/DoesNotExist"
"##;
        let err = resolve_yaml(yaml).unwrap_err();
        assert!(
            matches!(err, StructuralError::UnresolvedRef(ref s) if s.contains("DoesNotExist")),
            "expected UnresolvedRef, got: {:?}",
            err
        );
    }

    #[test]
    fn external_ref_is_unresolved() {
        let yaml = r##"
openapi: "3.1.0"
components:
  schemas:
    Remote:
      $ref: "other.yaml#/components/schemas/Pet"
"##;
        let err = resolve_yaml(yaml).unwrap_err();
        assert!(matches!(err, StructuralError::UnresolvedRef(_)), "got {:?}", err);
    }

    #[test]
    fn circular_ref_returns_error() {
        let yaml = r##"
openapi: "3.1.0"
components:
  schemas:
    Node:
      type: object
      properties:
        child:
          $ref: "#/components/schemas/Node"
"##;
        let err = resolve_yaml(yaml).unwrap_err();
        assert!(
            matches!(err, StructuralError::CircularRef(ref s) if s.contains("Node")),
            "expected CircularRef, got: {:?}",
            err
        );
    }

    #[test]
    fn indirect_cycle_returns_error() {
        let yaml = r##"
openapi: "3.1.0"
components:
  schemas:
    A:
      $ref: "#/components/schemas/B"
    B:
      $ref: "#/components/schemas/A"
"##;
        let err = resolve_yaml(yaml).unwrap_err();
        assert!(matches!(err, StructuralError::CircularRef(_)), "got {:?}", err);
    }

    #[test]
    fn deep_chain_hits_depth_limit() {
        let mut schemas = Map::new();
        for i in 0..=MAX_REF_DEPTH {
            schemas.insert(
                format!("S{}", i),
                json!({"$ref": format!("#/components/schemas/S{}", i + 1)}),
            );
        }
        schemas.insert(
            format!("S{}", MAX_REF_DEPTH + 1),
            json!({"type": "string"}),
        );
        let raw = RawDocument {
            root: json!({"openapi": "3.1.0", "components": {"schemas": schemas}}),
        };

        let err = resolve(raw).unwrap_err();
        assert!(matches!(err, StructuralError::TooDeep { .. }), "got {:?}", err);
    }

    #[test]
    fn pointer_lookup_handles_escapes_and_indices() {
        let root = json!({"paths": {"/a/b": {"tags": ["x", "y"]}}});
        assert_eq!(
            lookup_pointer(&root, "#/paths/~1a~1b/tags/1"),
            Some(&json!("y"))
        );
        assert_eq!(lookup_pointer(&root, "#"), Some(&root));
        assert_eq!(lookup_pointer(&root, "#/paths/missing"), None);
        assert_eq!(lookup_pointer(&root, "other.yaml#/paths"), None);
    }
}
