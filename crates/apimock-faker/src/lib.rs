//! Fake JSON value generation from JSON schemas.
//!
//! Given a fully resolved schema, [`Faker`] produces a random value that
//! conforms to it: every declared property is filled (optional ones too),
//! string formats get realistic values and numeric, string and array bounds
//! are honored.

mod error;
mod formats;

use rand::seq::IndexedRandom;
use rand::Rng;
use serde_json::{Map, Number, Value};

pub use error::GenerationError;

/// Generation limits.
#[derive(Debug, Clone)]
pub struct FakerOptions {
    /// Maximum schema nesting depth.
    pub max_depth: usize,
    /// Array length used when the schema declares no `minItems`.
    pub min_items: usize,
    /// Array length cap used when the schema declares no `maxItems`.
    pub max_items: usize,
}

impl Default for FakerOptions {
    fn default() -> Self {
        Self {
            max_depth: 32,
            min_items: 1,
            max_items: 3,
        }
    }
}

/// Default numeric span when a schema gives only one bound, or none.
const DEFAULT_SPAN: f64 = 1000.0;

/// Schema-driven fake value generator.
#[derive(Debug, Clone, Default)]
pub struct Faker {
    options: FakerOptions,
}

impl Faker {
    pub fn new(options: FakerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FakerOptions {
        &self.options
    }

    /// Generate a value for `schema` using the thread-local RNG.
    pub fn fake(&self, schema: &Value) -> Result<Value, GenerationError> {
        self.generate(schema, &mut rand::rng())
    }

    /// Generate a value for `schema` from the given RNG.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        schema: &Value,
        rng: &mut R,
    ) -> Result<Value, GenerationError> {
        Generation {
            options: &self.options,
            rng,
            path: Vec::new(),
        }
        .value(schema)
    }
}

/// State for one generation run.
struct Generation<'a, R: ?Sized> {
    options: &'a FakerOptions,
    rng: &'a mut R,
    /// Property names and array indices leading to the current node.
    path: Vec<String>,
}

impl<R: Rng + ?Sized> Generation<'_, R> {
    fn location(&self) -> String {
        if self.path.is_empty() {
            "#".to_string()
        } else {
            format!("#/{}", self.path.join("/"))
        }
    }

    fn unsatisfiable(&self, reason: impl Into<String>) -> GenerationError {
        GenerationError::Unsatisfiable {
            path: self.location(),
            reason: reason.into(),
        }
    }

    fn nested(&mut self, segment: String, schema: &Value) -> Result<Value, GenerationError> {
        self.path.push(segment);
        let value = self.value(schema);
        self.path.pop();
        value
    }

    fn value(&mut self, schema: &Value) -> Result<Value, GenerationError> {
        if self.path.len() > self.options.max_depth {
            return Err(GenerationError::TooDeep {
                path: self.location(),
                limit: self.options.max_depth,
            });
        }

        let obj = match schema {
            Value::Object(obj) => obj,
            Value::Bool(true) => {
                return Ok(Value::String(formats::word(&mut *self.rng).to_string()))
            }
            Value::Bool(false) => {
                return Err(self.unsatisfiable("schema `false` accepts nothing"))
            }
            other => {
                return Err(GenerationError::InvalidSchema {
                    path: self.location(),
                    reason: format!("expected an object, found {}", other),
                })
            }
        };

        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            return Err(GenerationError::UnresolvedRef {
                path: self.location(),
                reference: reference.to_string(),
            });
        }
        if let Some(constant) = obj.get("const") {
            return Ok(constant.clone());
        }
        if let Some(members) = obj.get("enum").and_then(Value::as_array) {
            return members
                .choose(&mut *self.rng)
                .cloned()
                .ok_or_else(|| GenerationError::EmptyEnum {
                    path: self.location(),
                });
        }
        if let Some(parts) = obj.get("allOf").and_then(Value::as_array) {
            let merged = merge_composition(obj, "allOf", parts);
            return self.value(&merged);
        }
        for keyword in ["oneOf", "anyOf"] {
            if let Some(options) = obj.get(keyword).and_then(Value::as_array) {
                let Some(choice) = options.choose(&mut *self.rng) else {
                    return Err(self.unsatisfiable(format!("empty {}", keyword)));
                };
                let merged = merge_composition(obj, keyword, std::slice::from_ref(choice));
                return self.value(&merged);
            }
        }

        match schema_type(obj) {
            "object" => self.object(obj),
            "array" => self.array(obj),
            "string" => self.string(obj),
            "integer" => self.integer(obj),
            "number" => self.number(obj),
            "boolean" => Ok(Value::Bool(self.rng.random_bool(0.5))),
            "null" => Ok(Value::Null),
            other => Err(GenerationError::InvalidSchema {
                path: self.location(),
                reason: format!("unknown type '{}'", other),
            }),
        }
    }

    fn object(&mut self, obj: &Map<String, Value>) -> Result<Value, GenerationError> {
        let mut out = Map::new();
        if let Some(properties) = obj.get("properties").and_then(Value::as_object) {
            for (name, property) in properties {
                let value = self.nested(name.clone(), property)?;
                out.insert(name.clone(), value);
            }
        }
        Ok(Value::Object(out))
    }

    fn array(&mut self, obj: &Map<String, Value>) -> Result<Value, GenerationError> {
        // Tuple form: one schema per position.
        if let Some(positions) = obj
            .get("prefixItems")
            .or_else(|| obj.get("items"))
            .and_then(Value::as_array)
        {
            return positions
                .iter()
                .enumerate()
                .map(|(i, item)| self.nested(i.to_string(), item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array);
        }

        // Defaults only fill in what the schema leaves open.
        let declared_max = usize_keyword(obj, "maxItems");
        let min = usize_keyword(obj, "minItems")
            .unwrap_or_else(|| self.options.min_items.min(declared_max.unwrap_or(usize::MAX)));
        let max = declared_max.unwrap_or_else(|| self.options.max_items.max(min));
        if min > max {
            return Err(self.unsatisfiable(format!("minItems {} > maxItems {}", min, max)));
        }
        let count = self.rng.random_range(min..=max);

        let empty = Value::Object(Map::new());
        let item_schema = obj.get("items").unwrap_or(&empty);
        let unique = obj
            .get("uniqueItems")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let mut items: Vec<Value> = Vec::with_capacity(count);
        let mut attempts = 0;
        while items.len() < count {
            let item = self.nested(items.len().to_string(), item_schema)?;
            attempts += 1;
            if unique && items.contains(&item) {
                if attempts > count * 10 {
                    if items.len() >= min {
                        break;
                    }
                    return Err(self.unsatisfiable("cannot produce enough unique items"));
                }
                continue;
            }
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn string(&mut self, obj: &Map<String, Value>) -> Result<Value, GenerationError> {
        let min = usize_keyword(obj, "minLength");
        let max = usize_keyword(obj, "maxLength");
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(self.unsatisfiable(format!("minLength {} > maxLength {}", min, max)));
            }
        }

        let formatted = obj
            .get("format")
            .and_then(Value::as_str)
            .and_then(|format| formats::generate_format(format, &mut *self.rng));
        if let Some(text) = formatted {
            return Ok(Value::String(text));
        }

        let count = self.rng.random_range(1..=3);
        let mut text = formats::words(&mut *self.rng, count);
        if let Some(min) = min {
            while text.chars().count() < min {
                text.push(' ');
                text.push_str(formats::word(&mut *self.rng));
            }
        }
        if let Some(max) = max {
            text = text.chars().take(max).collect::<String>().trim_end().to_string();
            // Trimming may undercut the minimum again.
            let min = min.unwrap_or(0);
            while text.chars().count() < min {
                text.push('x');
            }
        }
        Ok(Value::String(text))
    }

    fn integer(&mut self, obj: &Map<String, Value>) -> Result<Value, GenerationError> {
        let (lo, hi) = self.bounds(obj, 1.0)?;
        let step = obj
            .get("multipleOf")
            .and_then(Value::as_f64)
            .filter(|m| *m > 0.0)
            .unwrap_or(1.0);

        let first = (lo / step).ceil() as i64;
        let last = (hi / step).floor() as i64;
        if first > last {
            return Err(self.unsatisfiable(format!("no integer multiple of {} in [{}, {}]", step, lo, hi)));
        }
        let k = self.rng.random_range(first..=last);
        let value = (k as f64 * step).round() as i64;
        Ok(Value::Number(value.into()))
    }

    fn number(&mut self, obj: &Map<String, Value>) -> Result<Value, GenerationError> {
        let (lo, hi) = self.bounds(obj, 0.01)?;

        let value = match obj
            .get("multipleOf")
            .and_then(Value::as_f64)
            .filter(|m| *m > 0.0)
        {
            Some(step) => {
                let first = (lo / step).ceil() as i64;
                let last = (hi / step).floor() as i64;
                if first > last {
                    return Err(self.unsatisfiable(format!("no multiple of {} in [{}, {}]", step, lo, hi)));
                }
                self.rng.random_range(first..=last) as f64 * step
            }
            None => {
                let raw = if lo < hi { self.rng.random_range(lo..=hi) } else { lo };
                let rounded = (raw * 100.0).round() / 100.0;
                if (lo..=hi).contains(&rounded) {
                    rounded
                } else {
                    raw
                }
            }
        };

        Number::from_f64(value)
            .map(Value::Number)
            .ok_or_else(|| self.unsatisfiable(format!("{} is not a finite number", value)))
    }

    /// Inclusive numeric bounds from `minimum`/`maximum` and their exclusive
    /// forms (boolean flags in OpenAPI 3.0, numbers in 3.1). `epsilon` is the
    /// step used to move off an exclusive bound.
    fn bounds(&self, obj: &Map<String, Value>, epsilon: f64) -> Result<(f64, f64), GenerationError> {
        let lower = bound(obj, "minimum", "exclusiveMinimum", epsilon);
        let upper = bound(obj, "maximum", "exclusiveMaximum", -epsilon);

        let (lo, hi) = match (lower, upper) {
            (Some(lo), Some(hi)) => (lo, hi),
            (Some(lo), None) => (lo, lo + DEFAULT_SPAN),
            (None, Some(hi)) => (hi - DEFAULT_SPAN, hi),
            (None, None) => (1.0, DEFAULT_SPAN),
        };
        if lo > hi {
            return Err(self.unsatisfiable(format!("minimum {} > maximum {}", lo, hi)));
        }
        Ok((lo, hi))
    }
}

fn bound(obj: &Map<String, Value>, inclusive: &str, exclusive: &str, epsilon: f64) -> Option<f64> {
    match obj.get(exclusive) {
        Some(Value::Number(n)) => n.as_f64().map(|v| v + epsilon),
        Some(Value::Bool(true)) => obj.get(inclusive).and_then(Value::as_f64).map(|v| v + epsilon),
        _ => obj.get(inclusive).and_then(Value::as_f64),
    }
}

fn usize_keyword(obj: &Map<String, Value>, keyword: &str) -> Option<usize> {
    obj.get(keyword)
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
}

/// The declared type, or one inferred from the keywords present.
fn schema_type(obj: &Map<String, Value>) -> &str {
    match obj.get("type") {
        Some(Value::String(t)) => return t,
        // `["string", "null"]`: prefer the first non-null type.
        Some(Value::Array(types)) => {
            let mut names = types.iter().filter_map(Value::as_str);
            if let Some(t) = names.clone().find(|t| *t != "null").or_else(|| names.next()) {
                return t;
            }
        }
        _ => {}
    }

    if obj.contains_key("properties") {
        "object"
    } else if obj.contains_key("items") || obj.contains_key("prefixItems") {
        "array"
    } else if ["minimum", "maximum", "exclusiveMinimum", "exclusiveMaximum", "multipleOf"]
        .iter()
        .any(|k| obj.contains_key(*k))
    {
        "number"
    } else if ["format", "minLength", "maxLength", "pattern"]
        .iter()
        .any(|k| obj.contains_key(*k))
    {
        "string"
    } else {
        "object"
    }
}

/// Fold composition members into the enclosing schema.
///
/// Later members win for plain keys; `properties` maps and `required` lists
/// are combined so every member's fields survive.
fn merge_composition(base: &Map<String, Value>, keyword: &str, parts: &[Value]) -> Value {
    let mut merged: Map<String, Value> = base
        .iter()
        .filter(|(k, _)| k.as_str() != keyword)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    for part in parts.iter().filter_map(Value::as_object) {
        for (key, value) in part {
            match (key.as_str(), merged.get_mut(key), value) {
                ("properties", Some(Value::Object(existing)), Value::Object(extra)) => {
                    for (name, schema) in extra {
                        existing.insert(name.clone(), schema.clone());
                    }
                }
                ("required", Some(Value::Array(existing)), Value::Array(extra)) => {
                    for name in extra {
                        if !existing.contains(name) {
                            existing.push(name.clone());
                        }
                    }
                }
                _ => {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
    }
    Value::Object(merged)
}
