//! Tagged value tree for document data.
//!
//! Documents arrive and leave at the API boundary as arbitrary JSON, but the
//! schema validator and projection logic need to reason about declared
//! types (string, number, integer, boolean, object, array, vector) rather
//! than `serde_json::Value`'s untyped number/array split. `Value` is that
//! typed middle layer; conversions to/from `serde_json::Value` are lossless
//! except that `vector` collapses to a JSON array on the way out.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A document field's declared type, per the schema subset in §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Vector,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::Vector => "vector",
        };
        write!(f, "{s}")
    }
}

/// A typed document value. Maps 1:1 onto JSON except `Vector`, which is a
/// JSON array of numbers that the validator has confirmed matches a
/// VectorField's declared dimensionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(String),
    Vector(Vec<f32>),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// The runtime type this value would be validated against, ignoring
    /// the string/vector ambiguity (both decode from a JSON array of
    /// numbers; `actual_type` reports `Array` for those — the validator
    /// is the one place that knows to also try `Vector`).
    pub fn actual_type(&self) -> FieldType {
        match self {
            Value::Null => FieldType::Object, // null has no declared type of its own
            Value::Bool(_) => FieldType::Boolean,
            Value::Integer(_) => FieldType::Integer,
            Value::Number(_) => FieldType::Number,
            Value::String(_) => FieldType::String,
            Value::Vector(_) => FieldType::Vector,
            Value::Array(_) => FieldType::Array,
            Value::Object(_) => FieldType::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Interpret this value as a flat numeric vector, whether it arrived as
    /// `Vector` or as a JSON `Array` of all-numeric scalars.
    pub fn as_numeric_vector(&self) -> Option<Vec<f32>> {
        match self {
            Value::Vector(v) => Some(v.clone()),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Number(n) => Some(*n as f32),
                    Value::Integer(n) => Some(*n as f32),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Number(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn into_json(self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Integer(i) => serde_json::Value::from(i),
            Value::Number(n) => serde_json::json!(n),
            Value::String(s) => serde_json::Value::String(s),
            Value::Vector(v) => serde_json::Value::Array(
                v.into_iter().map(|f| serde_json::json!(f)).collect(),
            ),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Value::into_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into_json())).collect(),
            ),
        }
    }
}

/// A document's `data` field: a flat map from schema field name to value.
pub type DocumentData = BTreeMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_roundtrip_preserves_objects_and_arrays() {
        let json = serde_json::json!({"name": "Pen", "price": 2.5, "tags": ["a", "b"]});
        let value = Value::from_json(json.clone());
        assert_eq!(value.clone().into_json(), json);
    }

    #[test]
    fn numeric_vector_from_plain_json_array() {
        let value = Value::from_json(serde_json::json!([1, 0.5, 2]));
        assert_eq!(value.as_numeric_vector(), Some(vec![1.0, 0.5, 2.0]));
    }

    #[test]
    fn actual_type_distinguishes_integer_and_number() {
        assert_eq!(Value::Integer(1).actual_type(), FieldType::Integer);
        assert_eq!(Value::Number(1.5).actual_type(), FieldType::Number);
    }
}
