//! Document loading: storage → parsed tree.

use std::path::Path;

use serde_json::{Map, Number, Value};

use crate::error::LoadError;
use crate::model::RawDocument;

/// Read and parse a document from a YAML or JSON file.
///
/// Files ending in `.json` are parsed as JSON; everything else as YAML.
pub fn load_document(path: &Path) -> Result<RawDocument, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let root = if is_json {
        serde_json::from_str(&content).map_err(|e| LoadError::Parse(e.to_string()))?
    } else {
        parse_yaml(&content)?
    };
    check_root(root)
}

/// Parse a document from a YAML/JSON string.
pub fn load_str(input: &str) -> Result<RawDocument, LoadError> {
    check_root(parse_yaml(input)?)
}

fn parse_yaml(input: &str) -> Result<Value, LoadError> {
    // JSON is valid YAML, so this handles both.
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(input).map_err(|e| LoadError::Parse(e.to_string()))?;
    yaml_to_json(yaml)
}

fn check_root(root: Value) -> Result<RawDocument, LoadError> {
    let obj = root
        .as_object()
        .ok_or_else(|| LoadError::Parse("document root must be a mapping".into()))?;

    let version = match obj.get("openapi") {
        Some(Value::String(v)) => v.clone(),
        // `openapi: 3.0` without quotes reads as a number.
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(LoadError::NotOpenApi),
    };
    if !version.starts_with("3.") {
        return Err(LoadError::UnsupportedVersion(version));
    }

    Ok(RawDocument { root })
}

/// Convert a YAML tree into a JSON tree, keeping mapping order.
///
/// YAML allows non-string keys (`200:` is an integer); JSON does not, so
/// scalar keys are rendered to strings.
fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, LoadError> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => yaml_number(&n),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut obj = Map::with_capacity(mapping.len());
            for (key, val) in mapping {
                obj.insert(yaml_key(key)?, yaml_to_json(val)?);
            }
            Value::Object(obj)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Number(i.into())
    } else if let Some(u) = n.as_u64() {
        Value::Number(u.into())
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, LoadError> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok("null".to_string()),
        serde_yaml::Value::Tagged(tagged) => yaml_key(tagged.value),
        other => Err(LoadError::Parse(format!(
            "unsupported mapping key: {:?}",
            other
        ))),
    }
}
