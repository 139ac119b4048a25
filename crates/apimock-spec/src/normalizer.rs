//! Normalization passes over a resolved document.
//!
//! Runs three passes in order: schema keying, parameter inheritance and
//! composition flattening. Each pass edits the tree in place and the result
//! is frozen as a [`Document`].

use serde_json::Value;

use crate::model::{
    component_schemas_mut, merge_all_of, Document, PathItemKey, ResolvedDocument, SchemaNode,
};

/// Normalize a resolved document.
pub fn normalize(resolved: ResolvedDocument) -> Document {
    let mut root = resolved.root;
    key_schemas(&mut root);
    inherit_parameters(&mut root);
    flatten_compositions(&mut root);
    Document::new(root)
}

/// Set `key` on a schema object. Without `overwrite`, an existing key wins.
pub(crate) fn stamp_key(schema: &mut Value, name: &str, overwrite: bool) {
    if let Value::Object(obj) = schema {
        if overwrite || !obj.contains_key("key") {
            obj.insert("key".to_string(), Value::String(name.to_string()));
        }
    }
}

/// Pass 1: each named schema records its own name.
fn key_schemas(root: &mut Value) {
    let Some(schemas) = component_schemas_mut(root) else {
        return;
    };
    for (name, schema) in schemas.iter_mut() {
        stamp_key(schema, name, true);
    }
}

/// Pass 2: path-level parameters are prepended to each operation's own.
fn inherit_parameters(root: &mut Value) {
    let Some(paths) = root.get_mut("paths").and_then(Value::as_object_mut) else {
        return;
    };

    for (path, item) in paths.iter_mut() {
        let Some(item) = item.as_object_mut() else {
            continue;
        };
        let shared: Vec<Value> = item
            .get("parameters")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for (key, operation) in item.iter_mut() {
            if PathItemKey::classify(key) != PathItemKey::Operation {
                continue;
            }
            let Some(operation) = operation.as_object_mut() else {
                tracing::warn!(path = %path, method = %key, "operation is not a mapping");
                continue;
            };

            let own = match operation.remove("parameters") {
                Some(Value::Array(own)) => own,
                _ => Vec::new(),
            };
            let mut merged = shared.clone();
            merged.extend(own);
            operation.insert("parameters".to_string(), Value::Array(merged));
        }
    }
}

/// Pass 3: top-level `allOf` properties of named schemas become one object.
fn flatten_compositions(root: &mut Value) {
    let Some(schemas) = component_schemas_mut(root) else {
        return;
    };

    for schema in schemas.values_mut() {
        let Some(properties) = schema
            .get_mut("properties")
            .and_then(Value::as_object_mut)
        else {
            continue;
        };
        for property in properties.values_mut() {
            if let SchemaNode::Composition(parts) = SchemaNode::classify(property) {
                *property = merge_all_of(parts);
            }
        }
    }
}
