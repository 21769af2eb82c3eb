//! The wire-level filter language shared by every storage adapter.
//!
//! A filter is a map from field name to either a bare value (equality) or
//! an operator map (`$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`,
//! `$nin`, `$exists`, `$and`, `$or`, `$not`, `$regex`). Unknown operators
//! are rejected with a typed error rather than silently ignored.

use std::collections::BTreeMap;

use regex::Regex;

use crate::error::{CoreError, Result};
use crate::model::value::Value;

/// A parsed filter predicate, ready to evaluate against a document's data.
#[derive(Debug, Clone)]
pub enum Predicate {
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
    Nin(String, Vec<Value>),
    /// `field: {$exists: bool}` — does the key exist in the document at all
    /// (distinct from being present-but-null)?
    Exists(String, bool),
    Regex(String, Regex),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

/// Parse a wire-level filter map into an evaluable `Predicate`. An empty
/// filter matches every document.
pub fn parse(filter: &BTreeMap<String, Value>) -> Result<Predicate> {
    let mut clauses = Vec::new();
    for (field, value) in filter {
        clauses.push(parse_field_clause(field, value)?);
    }
    Ok(Predicate::And(clauses))
}

fn parse_field_clause(field: &str, value: &Value) -> Result<Predicate> {
    match field {
        "$and" => Ok(Predicate::And(parse_clause_list(value)?)),
        "$or" => Ok(Predicate::Or(parse_clause_list(value)?)),
        "$not" => {
            let Value::Object(inner) = value else {
                return Err(CoreError::BadRequest("$not expects an operator map".into()));
            };
            Ok(Predicate::Not(Box::new(parse(inner)?)))
        }
        _ => match value {
            Value::Object(ops) => parse_operator_map(field, ops),
            scalar => Ok(Predicate::Eq(field.to_string(), scalar.clone())),
        },
    }
}

fn parse_clause_list(value: &Value) -> Result<Vec<Predicate>> {
    let Value::Array(items) = value else {
        return Err(CoreError::BadRequest(
            "$and/$or expect an array of filter maps".into(),
        ));
    };
    items
        .iter()
        .map(|item| match item {
            Value::Object(m) => parse(m),
            _ => Err(CoreError::BadRequest(
                "$and/$or array entries must be filter maps".into(),
            )),
        })
        .collect()
}

fn parse_operator_map(field: &str, ops: &BTreeMap<String, Value>) -> Result<Predicate> {
    // A field with more than one operator is conjoined implicitly, e.g.
    // `{price: {$gte: 1, $lte: 9}}`.
    let mut clauses = Vec::new();
    for (op, arg) in ops {
        let clause = match op.as_str() {
            "$eq" => Predicate::Eq(field.to_string(), arg.clone()),
            "$ne" => Predicate::Ne(field.to_string(), arg.clone()),
            "$gt" => Predicate::Gt(field.to_string(), arg.clone()),
            "$gte" => Predicate::Gte(field.to_string(), arg.clone()),
            "$lt" => Predicate::Lt(field.to_string(), arg.clone()),
            "$lte" => Predicate::Lte(field.to_string(), arg.clone()),
            "$in" => Predicate::In(field.to_string(), array_arg(op, arg)?),
            "$nin" => Predicate::Nin(field.to_string(), array_arg(op, arg)?),
            "$exists" => {
                let Value::Bool(b) = arg else {
                    return Err(CoreError::BadRequest("$exists expects a boolean".into()));
                };
                Predicate::Exists(field.to_string(), *b)
            }
            "$regex" => {
                let Value::String(pattern) = arg else {
                    return Err(CoreError::BadRequest("$regex expects a string".into()));
                };
                let re = Regex::new(pattern)
                    .map_err(|e| CoreError::BadRequest(format!("invalid $regex pattern: {e}")))?;
                Predicate::Regex(field.to_string(), re)
            }
            other => {
                return Err(CoreError::BadRequest(format!(
                    "unknown filter operator '{other}'"
                )))
            }
        };
        clauses.push(clause);
    }
    Ok(if clauses.len() == 1 {
        clauses.into_iter().next().unwrap()
    } else {
        Predicate::And(clauses)
    })
}

fn array_arg(op: &str, value: &Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        _ => Err(CoreError::BadRequest(format!("{op} expects an array"))),
    }
}

/// Evaluate a predicate against a document's data. A `null`-valued
/// `$eq`/bare match on a field translates to "field is absent or null",
/// satisfying the cross-adapter `deleted_at` requirement.
pub fn matches(predicate: &Predicate, data: &BTreeMap<String, Value>) -> bool {
    match predicate {
        Predicate::Eq(field, value) => field_equals(data, field, value),
        Predicate::Ne(field, value) => !field_equals(data, field, value),
        Predicate::Gt(field, value) => compare(data, field, value) == Some(std::cmp::Ordering::Greater),
        Predicate::Gte(field, value) => {
            matches!(compare(data, field, value), Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal))
        }
        Predicate::Lt(field, value) => compare(data, field, value) == Some(std::cmp::Ordering::Less),
        Predicate::Lte(field, value) => {
            matches!(compare(data, field, value), Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal))
        }
        Predicate::In(field, values) => values.iter().any(|v| field_equals(data, field, v)),
        Predicate::Nin(field, values) => !values.iter().any(|v| field_equals(data, field, v)),
        Predicate::Exists(field, expected) => data.contains_key(field) == *expected,
        Predicate::Regex(field, re) => match data.get(field) {
            Some(Value::String(s)) => re.is_match(s),
            _ => false,
        },
        Predicate::And(clauses) => clauses.iter().all(|c| matches(c, data)),
        Predicate::Or(clauses) => clauses.iter().any(|c| matches(c, data)),
        Predicate::Not(inner) => !matches(inner, data),
    }
}

/// A bare or `$eq` match against `null` means "absent or explicitly null",
/// so that `{deleted_at: null}` is translatable on every adapter (§4.A).
fn field_equals(data: &BTreeMap<String, Value>, field: &str, value: &Value) -> bool {
    match data.get(field) {
        None => value.is_null(),
        Some(actual) => actual == value || (actual.is_null() && value.is_null()),
    }
}

fn compare(data: &BTreeMap<String, Value>, field: &str, value: &Value) -> Option<std::cmp::Ordering> {
    let actual = data.get(field)?;
    numeric_cmp(actual, value).or_else(|| string_cmp(actual, value))
}

fn numeric_cmp(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    let a = as_f64(a)?;
    let b = as_f64(b)?;
    a.partial_cmp(&b)
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Integer(i) => Some(*i as f64),
        Value::Number(n) => Some(*n),
        _ => None,
    }
}

fn string_cmp(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pairs: Vec<(&str, Value)>) -> BTreeMap<String, Value> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn bare_value_is_equality() {
        let filter = BTreeMap::from([("price".to_string(), Value::Integer(5))]);
        let predicate = parse(&filter).unwrap();
        assert!(matches(&predicate, &doc(vec![("price", Value::Integer(5))])));
        assert!(!matches(&predicate, &doc(vec![("price", Value::Integer(6))])));
    }

    #[test]
    fn null_filter_matches_absent_or_null_field() {
        let filter = BTreeMap::from([("deleted_at".to_string(), Value::Null)]);
        let predicate = parse(&filter).unwrap();
        assert!(matches(&predicate, &doc(vec![])));
        assert!(matches(&predicate, &doc(vec![("deleted_at", Value::Null)])));
        assert!(!matches(
            &predicate,
            &doc(vec![("deleted_at", Value::String("2024".into()))])
        ));
    }

    #[test]
    fn operator_map_gt_lte_range() {
        let filter = BTreeMap::from([(
            "price".to_string(),
            Value::Object(BTreeMap::from([
                ("$gte".to_string(), Value::Integer(1)),
                ("$lte".to_string(), Value::Integer(9)),
            ])),
        )]);
        let predicate = parse(&filter).unwrap();
        assert!(matches(&predicate, &doc(vec![("price", Value::Integer(5))])));
        assert!(!matches(&predicate, &doc(vec![("price", Value::Integer(10))])));
    }

    #[test]
    fn in_and_nin() {
        let filter = BTreeMap::from([(
            "tag".to_string(),
            Value::Object(BTreeMap::from([(
                "$in".to_string(),
                Value::Array(vec![Value::String("a".into()), Value::String("b".into())]),
            )])),
        )]);
        let predicate = parse(&filter).unwrap();
        assert!(matches(&predicate, &doc(vec![("tag", Value::String("a".into()))])));
        assert!(!matches(&predicate, &doc(vec![("tag", Value::String("c".into()))])));
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let filter = BTreeMap::from([(
            "price".to_string(),
            Value::Object(BTreeMap::from([("$bogus".to_string(), Value::Integer(1))])),
        )]);
        assert!(parse(&filter).is_err());
    }

    #[test]
    fn and_or_not_compose() {
        let filter = BTreeMap::from([(
            "$or".to_string(),
            Value::Array(vec![
                Value::Object(BTreeMap::from([("a".to_string(), Value::Integer(1))])),
                Value::Object(BTreeMap::from([("b".to_string(), Value::Integer(2))])),
            ]),
        )]);
        let predicate = parse(&filter).unwrap();
        assert!(matches(&predicate, &doc(vec![("a", Value::Integer(1))])));
        assert!(matches(&predicate, &doc(vec![("b", Value::Integer(2))])));
        assert!(!matches(&predicate, &doc(vec![("a", Value::Integer(9))])));
    }

    #[test]
    fn regex_matches_string_fields_only() {
        let filter = BTreeMap::from([(
            "name".to_string(),
            Value::Object(BTreeMap::from([(
                "$regex".to_string(),
                Value::String("^prod".into()),
            )])),
        )]);
        let predicate = parse(&filter).unwrap();
        assert!(matches(&predicate, &doc(vec![("name", Value::String("product-1".into()))])));
        assert!(!matches(&predicate, &doc(vec![("name", Value::String("widget".into()))])));
    }
}
