//! Payload values carried by versioned rows.
//!
//! A row's entity-specific columns are modeled as a map of column name to
//! scalar [`Value`]. The scalar set is deliberately small: relational
//! payload columns, not documents. No implicit coercions; `Int(1)` never
//! equals `Float(1.0)`, and floats keep IEEE-754 equality (`NaN != NaN`).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A scalar payload value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL / absent column.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit IEEE-754 float.
    Float(f64),
    /// UTF-8 string.
    String(String),
}

impl Value {
    /// Type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
        }
    }

    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The string payload, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer payload, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Ordering between values of the same type; `None` across types.
    pub fn partial_cmp_same_type(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(std::cmp::Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Entity payload: column name to scalar value, ordered for deterministic
/// iteration (tests and the visualizer rely on it).
pub type Payload = BTreeMap<String, Value>;

/// Build a payload from a JSON object of scalars.
///
/// Arrays and nested objects are rejected; payload columns are relational
/// scalars.
pub fn payload_from_json(json: serde_json::Value) -> Result<Payload> {
    let serde_json::Value::Object(map) = json else {
        return Err(Error::Validation(format!(
            "payload must be a JSON object, got {}",
            json_type_name(&json)
        )));
    };
    let mut payload = Payload::new();
    for (column, value) in map {
        payload.insert(column, value_from_json(value)?);
    }
    Ok(payload)
}

fn value_from_json(json: serde_json::Value) -> Result<Value> {
    match json {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Float(f))
            } else {
                Err(Error::Validation(format!("unrepresentable number: {n}")))
            }
        }
        serde_json::Value::String(s) => Ok(Value::String(s)),
        other => Err(Error::Validation(format!(
            "payload columns must be scalars, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Apply `changes` over `base`, returning the merged payload. A `Null`
/// change overwrites (it is a real column value, not a deletion).
pub fn merge_payload(base: &Payload, changes: &Payload) -> Payload {
    let mut merged = base.clone();
    for (column, value) in changes {
        merged.insert(column.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn no_cross_type_equality() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::String("1".into()), Value::Int(1));
    }

    #[test]
    fn float_keeps_ieee_equality() {
        assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_eq!(Value::Float(0.0), Value::Float(-0.0));
    }

    #[test]
    fn payload_from_json_accepts_scalars() {
        let payload = payload_from_json(json!({
            "name": "Alice",
            "age": 30,
            "score": 1.5,
            "active": true,
            "note": null,
        }))
        .unwrap();
        assert_eq!(payload.get("name"), Some(&Value::String("Alice".into())));
        assert_eq!(payload.get("age"), Some(&Value::Int(30)));
        assert_eq!(payload.get("score"), Some(&Value::Float(1.5)));
        assert_eq!(payload.get("active"), Some(&Value::Bool(true)));
        assert_eq!(payload.get("note"), Some(&Value::Null));
    }

    #[test]
    fn payload_from_json_rejects_nesting() {
        assert!(payload_from_json(json!({"tags": ["a", "b"]})).is_err());
        assert!(payload_from_json(json!({"nested": {"x": 1}})).is_err());
        assert!(payload_from_json(json!("not an object")).is_err());
    }

    #[test]
    fn merge_overwrites_and_keeps_base() {
        let base = payload_from_json(json!({"name": "A", "age": 1})).unwrap();
        let changes = payload_from_json(json!({"name": "B"})).unwrap();
        let merged = merge_payload(&base, &changes);
        assert_eq!(merged.get("name"), Some(&Value::String("B".into())));
        assert_eq!(merged.get("age"), Some(&Value::Int(1)));
    }
}
