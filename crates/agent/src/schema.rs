//! Output schema and result extraction
//!
//! The schema is derived from the output type once, when the agent is
//! built. Extraction parses the final message, validates it against the
//! schema and decodes it into the caller's type. Any failure along the way
//! is a [`SchemaError`].

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Nesting limit for `$ref` chains and recursive types
const MAX_DEPTH: usize = 64;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("invalid output schema: {0}")]
    InvalidSchema(String),

    #[error("result is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("result does not match schema: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("result cannot be decoded: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("no assistant message to extract a result from")]
    Missing,
}

/// A compiled output schema
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    schema: Value,
    rendered: String,
}

impl OutputSchema {
    /// Derive the schema of `T`
    pub fn of<T: JsonSchema>() -> Result<Self, SchemaError> {
        let schema = schemars::schema_for!(T);
        let value =
            serde_json::to_value(&schema).map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
        Self::from_value(value)
    }

    /// Use a hand-written JSON Schema
    pub fn from_value(schema: Value) -> Result<Self, SchemaError> {
        if !(schema.is_object() || schema.is_boolean()) {
            return Err(SchemaError::InvalidSchema(
                "schema must be an object or a boolean".to_string(),
            ));
        }
        let rendered =
            serde_json::to_string(&schema).map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
        Ok(Self { schema, rendered })
    }

    pub fn as_value(&self) -> &Value {
        &self.schema
    }

    /// Serialized form shown to the model
    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    pub fn validate(&self, value: &Value) -> Result<(), SchemaError> {
        let mut validator = Validator::new(&self.schema);
        validator.check(&self.schema, value, "#", 0);
        if validator.errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Validation(validator.errors))
        }
    }

    /// Parse, validate and decode a final message's content
    pub fn extract<T: DeserializeOwned>(&self, content: &str) -> Result<T, SchemaError> {
        let body = strip_code_fence(content);
        let value: Value = serde_json::from_str(body).map_err(SchemaError::Parse)?;
        self.validate(&value)?;
        serde_json::from_value(value).map_err(SchemaError::Decode)
    }
}

/// Models like to wrap JSON answers in a Markdown fence.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    match rest.find('\n') {
        Some(pos) => rest[pos + 1..].trim(),
        None => rest.trim(),
    }
}

struct Validator<'a> {
    root: &'a Value,
    errors: Vec<String>,
}

impl<'a> Validator<'a> {
    fn new(root: &'a Value) -> Self {
        Self {
            root,
            errors: Vec::new(),
        }
    }

    fn fork(&self) -> Validator<'a> {
        Validator::new(self.root)
    }

    fn matches(&self, schema: &Value, value: &Value, path: &str, depth: usize) -> bool {
        let mut sub = self.fork();
        sub.check(schema, value, path, depth);
        sub.errors.is_empty()
    }

    fn fail(&mut self, path: &str, msg: impl AsRef<str>) {
        self.errors.push(format!("{}: {}", path, msg.as_ref()));
    }

    fn check(&mut self, schema: &Value, value: &Value, path: &str, depth: usize) {
        if depth > MAX_DEPTH {
            self.fail(path, "schema nesting too deep");
            return;
        }

        let obj = match schema {
            Value::Bool(true) => return,
            Value::Bool(false) => {
                self.fail(path, "no value is allowed here");
                return;
            }
            Value::Object(obj) => obj,
            _ => return,
        };

        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            match self.resolve(reference) {
                Some(target) => self.check(target, value, path, depth + 1),
                None => self.fail(path, format!("unresolvable reference '{}'", reference)),
            }
        }

        if let Some(expected) = obj.get("type") {
            let allowed: Vec<&str> = match expected {
                Value::String(t) => vec![t.as_str()],
                Value::Array(ts) => ts.iter().filter_map(Value::as_str).collect(),
                _ => Vec::new(),
            };
            if !allowed.is_empty() && !allowed.iter().any(|t| type_matches(t, value)) {
                self.fail(
                    path,
                    format!("expected {}, got {}", allowed.join(" or "), json_type(value)),
                );
                return;
            }
        }

        if let Some(options) = obj.get("enum").and_then(Value::as_array) {
            if !options.contains(value) {
                self.fail(path, format!("must be one of {}", Value::Array(options.clone())));
            }
        }

        if let Some(expected) = obj.get("const") {
            if expected != value {
                self.fail(path, format!("must equal {}", expected));
            }
        }

        match value {
            Value::Object(map) => self.check_object(obj, map, path, depth),
            Value::Array(items) => self.check_array(obj, items, path, depth),
            Value::String(s) => self.check_string(obj, s, path),
            Value::Number(n) => {
                if let Some(n) = n.as_f64() {
                    self.check_number(obj, n, path);
                }
            }
            _ => {}
        }

        if let Some(all) = obj.get("allOf").and_then(Value::as_array) {
            for sub in all {
                self.check(sub, value, path, depth + 1);
            }
        }

        if let Some(any) = obj.get("anyOf").and_then(Value::as_array) {
            if !any.iter().any(|s| self.matches(s, value, path, depth + 1)) {
                self.fail(path, "does not match any allowed schema");
            }
        }

        if let Some(one) = obj.get("oneOf").and_then(Value::as_array) {
            let hits = one
                .iter()
                .filter(|s| self.matches(s, value, path, depth + 1))
                .count();
            if hits != 1 {
                self.fail(path, format!("must match exactly one schema, matched {}", hits));
            }
        }

        if let Some(not) = obj.get("not") {
            if self.matches(not, value, path, depth + 1) {
                self.fail(path, "matches a disallowed schema");
            }
        }
    }

    fn check_object(
        &mut self,
        schema: &serde_json::Map<String, Value>,
        map: &serde_json::Map<String, Value>,
        path: &str,
        depth: usize,
    ) {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for field in required.iter().filter_map(Value::as_str) {
                if !map.contains_key(field) {
                    self.fail(path, format!("missing required field '{}'", field));
                }
            }
        }

        let properties = schema.get("properties").and_then(Value::as_object);
        let additional = schema.get("additionalProperties");

        for (key, item) in map {
            let child = format!("{}/{}", path, escape_pointer(key));
            match properties.and_then(|p| p.get(key)) {
                Some(prop_schema) => self.check(prop_schema, item, &child, depth + 1),
                None => match additional {
                    Some(Value::Bool(false)) => self.fail(&child, "unexpected field"),
                    Some(extra) => self.check(extra, item, &child, depth + 1),
                    None => {}
                },
            }
        }
    }

    fn check_array(
        &mut self,
        schema: &serde_json::Map<String, Value>,
        items: &[Value],
        path: &str,
        depth: usize,
    ) {
        if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
            if (items.len() as u64) < min {
                self.fail(path, format!("expected at least {} items", min));
            }
        }
        if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
            if (items.len() as u64) > max {
                self.fail(path, format!("expected at most {} items", max));
            }
        }
        if let Some(item_schema) = schema.get("items") {
            for (i, item) in items.iter().enumerate() {
                self.check(item_schema, item, &format!("{}/{}", path, i), depth + 1);
            }
        }
    }

    fn check_string(&mut self, schema: &serde_json::Map<String, Value>, s: &str, path: &str) {
        let len = s.chars().count() as u64;
        if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
            if len < min {
                self.fail(path, format!("shorter than {} characters", min));
            }
        }
        if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
            if len > max {
                self.fail(path, format!("longer than {} characters", max));
            }
        }
    }

    fn check_number(&mut self, schema: &serde_json::Map<String, Value>, n: f64, path: &str) {
        if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
            if n < min {
                self.fail(path, format!("must be >= {}", min));
            }
        }
        if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
            if n > max {
                self.fail(path, format!("must be <= {}", max));
            }
        }
        if let Some(min) = schema.get("exclusiveMinimum").and_then(Value::as_f64) {
            if n <= min {
                self.fail(path, format!("must be > {}", min));
            }
        }
        if let Some(max) = schema.get("exclusiveMaximum").and_then(Value::as_f64) {
            if n >= max {
                self.fail(path, format!("must be < {}", max));
            }
        }
    }

    /// Only document-local references are supported.
    fn resolve(&self, reference: &str) -> Option<&'a Value> {
        let pointer = reference.strip_prefix('#')?;
        self.root.pointer(pointer)
    }
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match (expected, value) {
        ("integer", Value::Number(n)) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        ("number", Value::Number(_)) => true,
        (e, v) => e == json_type(v),
    }
}
