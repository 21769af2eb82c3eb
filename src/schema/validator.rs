//! Document validation against a collection's `Schema` (§4.B).
//!
//! The validator is deterministic and side-effect-free: same document and
//! schema in, same violation list out. Callers are responsible for feeding
//! it the *merged* document on partial updates — `validate_document` never
//! sees a patch, only the full candidate state.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::collection::{FieldSchema, Schema};
use crate::model::value::{FieldType, Value};
use crate::model::VectorField;

/// A single schema violation, with a dotted field path for nested fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub path: String,
    pub reason: String,
}

impl Violation {
    fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Validate `data` against `schema`, consulting `vector_fields` for the
/// expected dimensionality of any field typed `vector`. Returns the
/// (possibly empty) ordered list of violations found.
pub fn validate_document(
    data: &BTreeMap<String, Value>,
    schema: &Schema,
    vector_fields: &[VectorField],
) -> Vec<Violation> {
    let mut violations = Vec::new();

    // Rule 1: required fields present and non-null.
    for field in &schema.required {
        match data.get(field) {
            None => violations.push(Violation::new(field, "required field is missing")),
            Some(v) if v.is_null() => {
                violations.push(Violation::new(field, "required field is null"))
            }
            Some(_) => {}
        }
    }

    // Rule 2 + 4: present fields match their declared type.
    for (name, value) in data {
        match schema.properties.get(name) {
            Some(decl) => validate_field(name, value, decl, vector_fields, &mut violations),
            None => {
                // Rule 3: extra fields allowed unless strict mode.
                if schema.strict {
                    violations.push(Violation::new(
                        name,
                        "field is not declared in schema and strict mode is enabled",
                    ));
                }
            }
        }
    }

    violations
}

fn validate_field(
    path: &str,
    value: &Value,
    decl: &FieldSchema,
    vector_fields: &[VectorField],
    violations: &mut Vec<Violation>,
) {
    if value.is_null() {
        // Non-required fields may be null; nothing further to check.
        return;
    }

    match decl.field_type {
        FieldType::Vector => validate_vector_field(path, value, decl, vector_fields, violations),
        FieldType::Array => validate_array_field(path, value, decl, vector_fields, violations),
        FieldType::Object => validate_object_field(path, value, violations),
        expected => {
            if value.actual_type() != expected && !numeric_widening_ok(expected, value) {
                violations.push(Violation::new(
                    path,
                    format!(
                        "expected type '{expected}', found '{}'",
                        value.actual_type()
                    ),
                ));
            }
        }
    }
}

/// An `Integer` satisfies a declared `number` field, and vice versa is not
/// allowed (a float literal for an `integer`-typed field is a mismatch).
fn numeric_widening_ok(expected: FieldType, value: &Value) -> bool {
    expected == FieldType::Number && matches!(value, Value::Integer(_))
}

fn validate_vector_field(
    path: &str,
    value: &Value,
    decl: &FieldSchema,
    vector_fields: &[VectorField],
    violations: &mut Vec<Violation>,
) {
    let Some(vector) = value.as_numeric_vector() else {
        violations.push(Violation::new(
            path,
            "expected a numeric array for vector-typed field",
        ));
        return;
    };

    let expected_dims = decl
        .dimensions
        .or_else(|| vector_fields.iter().find(|f| f.name == path).map(|f| f.dimensions));

    match expected_dims {
        Some(dims) if vector.len() as u32 != dims => {
            violations.push(Violation::new(
                path,
                format!(
                    "vector has {} dimensions, field declares {}",
                    vector.len(),
                    dims
                ),
            ));
        }
        Some(_) => {}
        None => violations.push(Violation::new(
            path,
            "vector-typed field has no matching VectorField declaration",
        )),
    }
}

fn validate_array_field(
    path: &str,
    value: &Value,
    decl: &FieldSchema,
    vector_fields: &[VectorField],
    violations: &mut Vec<Violation>,
) {
    let Some(items) = value.as_array() else {
        violations.push(Violation::new(path, "expected an array"));
        return;
    };

    let Some(item_schema) = decl.items.as_ref() else {
        // Schema::validate_well_formed already guarantees this is present
        // for a well-formed schema; tolerate its absence defensively.
        return;
    };

    for (i, item) in items.iter().enumerate() {
        validate_field(
            &format!("{path}[{i}]"),
            item,
            item_schema,
            vector_fields,
            violations,
        );
    }
}

fn validate_object_field(path: &str, value: &Value, violations: &mut Vec<Violation>) {
    if value.as_object().is_none() {
        violations.push(Violation::new(path, "expected an object"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::collection::IndexParams;
    use crate::model::{IndexType, Metric};

    fn schema_with(properties: Vec<(&str, FieldSchema)>, required: Vec<&str>) -> Schema {
        Schema {
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            required: required.into_iter().map(String::from).collect(),
            strict: false,
        }
    }

    fn field(ty: FieldType) -> FieldSchema {
        FieldSchema {
            field_type: ty,
            description: None,
            items: None,
            permissions: None,
            dimensions: None,
        }
    }

    #[test]
    fn missing_required_field_is_a_violation() {
        let schema = schema_with(vec![("name", field(FieldType::String))], vec!["name"]);
        let data = BTreeMap::new();
        let violations = validate_document(&data, &schema, &[]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "name");
    }

    #[test]
    fn null_required_field_is_a_violation() {
        let schema = schema_with(vec![("name", field(FieldType::String))], vec!["name"]);
        let data = BTreeMap::from([("name".to_string(), Value::Null)]);
        let violations = validate_document(&data, &schema, &[]);
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn type_mismatch_is_a_violation() {
        let schema = schema_with(vec![("price", field(FieldType::Number))], vec![]);
        let data = BTreeMap::from([("price".to_string(), Value::String("free".into()))]);
        let violations = validate_document(&data, &schema, &[]);
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn integer_satisfies_number_field() {
        let schema = schema_with(vec![("price", field(FieldType::Number))], vec![]);
        let data = BTreeMap::from([("price".to_string(), Value::Integer(5))]);
        assert!(validate_document(&data, &schema, &[]).is_empty());
    }

    #[test]
    fn extra_field_allowed_by_default() {
        let schema = schema_with(vec![], vec![]);
        let data = BTreeMap::from([("extra".to_string(), Value::Bool(true))]);
        assert!(validate_document(&data, &schema, &[]).is_empty());
    }

    #[test]
    fn extra_field_rejected_in_strict_mode() {
        let mut schema = schema_with(vec![], vec![]);
        schema.strict = true;
        let data = BTreeMap::from([("extra".to_string(), Value::Bool(true))]);
        assert_eq!(validate_document(&data, &schema, &[]).len(), 1);
    }

    #[test]
    fn array_items_validated_recursively() {
        let mut decl = field(FieldType::Array);
        decl.items = Some(Box::new(field(FieldType::String)));
        let schema = schema_with(vec![("tags", decl)], vec![]);
        let data = BTreeMap::from([(
            "tags".to_string(),
            Value::Array(vec![Value::String("a".into()), Value::Integer(1)]),
        )]);
        let violations = validate_document(&data, &schema, &[]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "tags[1]");
    }

    #[test]
    fn vector_field_dimension_mismatch_is_a_violation() {
        let schema = schema_with(vec![("embedding", field(FieldType::Vector))], vec![]);
        let vector_fields = vec![VectorField {
            name: "embedding".into(),
            dimensions: 3,
            metric: Metric::Cosine,
            index_type: IndexType::Hnsw,
            index_params: IndexParams::Hnsw {
                m: 16,
                ef_construct: 200,
            },
            auto_embed: false,
            provider_id: None,
            model: None,
            source_fields: vec![],
        }];
        let data = BTreeMap::from([(
            "embedding".to_string(),
            Value::Array(vec![Value::Number(1.0), Value::Number(2.0)]),
        )]);
        let violations = validate_document(&data, &schema, &vector_fields);
        assert_eq!(violations.len(), 1);
    }
}
