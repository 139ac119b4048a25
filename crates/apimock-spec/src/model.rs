use serde_json::{Map, Value};

/// HTTP methods recognized as operation keys under a path item.
/// Includes `query` from OpenAPI 3.2.
pub const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace", "query",
];

/// Path-item fields that describe the path itself rather than an operation.
const PATH_ITEM_FIELDS: &[&str] = &["parameters", "summary", "description", "servers", "$ref"];

/// A document as read from storage: parsed, but with `$ref`s still in place.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub(crate) root: Value,
}

/// A document in which every `$ref` has been replaced by its target.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    pub(crate) root: Value,
}

/// A resolved and normalized document, frozen for serving.
#[derive(Debug, Clone)]
pub struct Document {
    root: Value,
}

impl RawDocument {
    pub fn as_value(&self) -> &Value {
        &self.root
    }
}

impl ResolvedDocument {
    pub fn as_value(&self) -> &Value {
        &self.root
    }
}

impl Document {
    pub(crate) fn new(root: Value) -> Self {
        Self { root }
    }

    /// The whole normalized tree.
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    /// The `info.title` field, if declared.
    pub fn title(&self) -> Option<&str> {
        self.root.pointer("/info/title").and_then(Value::as_str)
    }

    /// Named reusable schemas in declaration order.
    pub fn schemas(&self) -> impl Iterator<Item = (&String, &Value)> {
        component_schemas(&self.root).into_iter().flatten()
    }

    /// Look up a named schema.
    pub fn schema(&self, name: &str) -> Option<&Value> {
        component_schemas(&self.root).and_then(|schemas| schemas.get(name))
    }

    /// Path items in declaration order.
    pub fn paths(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.root
            .get("paths")
            .and_then(Value::as_object)
            .into_iter()
            .flatten()
    }
}

pub(crate) fn component_schemas(root: &Value) -> Option<&Map<String, Value>> {
    root.pointer("/components/schemas").and_then(Value::as_object)
}

pub(crate) fn component_schemas_mut(root: &mut Value) -> Option<&mut Map<String, Value>> {
    root.pointer_mut("/components/schemas")
        .and_then(Value::as_object_mut)
}

/// How a key under a path item should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathItemKey {
    /// An HTTP method: the value is an operation.
    Operation,
    /// `parameters`, `summary` and the other path-level fields.
    PathField,
    /// A vendor extension (`x-…`).
    Extension,
    /// Anything else. Skipped with a warning.
    Unknown,
}

impl PathItemKey {
    pub fn classify(key: &str) -> Self {
        if key.starts_with("x-") {
            Self::Extension
        } else if PATH_ITEM_FIELDS.contains(&key) {
            Self::PathField
        } else if HTTP_METHODS.contains(&key.to_ascii_lowercase().as_str()) {
            Self::Operation
        } else {
            Self::Unknown
        }
    }
}

/// A node at a schema position, classified once by shape.
///
/// Every pass that needs to tell references, compositions and plain schemas
/// apart matches on this instead of probing keys itself.
#[derive(Debug, Clone, Copy)]
pub enum SchemaNode<'a> {
    /// `{"$ref": "#/…"}`.
    Reference(&'a str),
    /// `{"allOf": [...]}`: sub-schemas to merge in order.
    Composition(&'a [Value]),
    /// Any other object.
    Schema(&'a Map<String, Value>),
    /// `true` accepts anything, `false` nothing.
    Boolean(bool),
    /// Not a schema at all (null, number, string, array).
    Invalid(&'a Value),
}

impl<'a> SchemaNode<'a> {
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::Object(obj) => {
                if let Some(pointer) = obj.get("$ref").and_then(Value::as_str) {
                    Self::Reference(pointer)
                } else if let Some(parts) = obj.get("allOf").and_then(Value::as_array) {
                    Self::Composition(parts)
                } else {
                    Self::Schema(obj)
                }
            }
            Value::Bool(b) => Self::Boolean(*b),
            other => Self::Invalid(other),
        }
    }
}

/// Shallow left-to-right merge of sub-schemas: later keys win.
///
/// Entries that are not objects contribute nothing.
pub fn merge_all_of(parts: &[Value]) -> Value {
    let mut merged = Map::new();
    for part in parts {
        if let Some(obj) = part.as_object() {
            for (key, value) in obj {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(merged)
}
