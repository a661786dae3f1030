//! Field access and comparison helpers over JSON records.

use roster_rs_protocol::Document;
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// Resolve a dotted field path (`address.city`) within a record.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = doc.get(first)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Set a dotted field path, creating intermediate objects. Returns false when
/// an intermediate segment holds a non-object value.
pub fn set_path(doc: &mut Document, path: &str, value: Value) -> bool {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else {
        return false;
    };
    let mut current = doc;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match entry {
            Value::Object(map) => current = map,
            _ => return false,
        }
    }
    current.insert(last.to_string(), value);
    true
}

/// Remove a dotted field path, returning the removed value.
pub fn remove_path(doc: &mut Document, path: &str) -> Option<Value> {
    match path.split_once('.') {
        None => doc.shift_remove(path),
        Some((head, rest)) => match doc.get_mut(head)? {
            Value::Object(map) => remove_path(map, rest),
            _ => None,
        },
    }
}

/// Equality with numeric normalization (`5 == 5.0`).
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

/// Ordering between two values of comparable type; `None` across types.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Total ordering used by `$sort`: values of different types are ranked by
/// type (missing/null lowest), values of the same type by content.
pub fn sort_order(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    let rank = |value: Option<&Value>| match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    };
    match rank(left).cmp(&rank(right)) {
        Ordering::Equal => match (left, right) {
            (Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        other => other,
    }
}

/// JSON number from a float, collapsing integral values to integers.
pub fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::Number(Number::from(value as i64))
    } else {
        Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Sum of two numbers, staying integral when both are.
pub fn add_numbers(left: &Number, right: &Number) -> Option<Value> {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return Some(Value::Number(Number::from(sum)));
        }
    }
    Some(number_value(left.as_f64()? + right.as_f64()?))
}

/// Product of two numbers, staying integral when both are.
pub fn mul_numbers(left: &Number, right: &Number) -> Option<Value> {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        if let Some(product) = a.checked_mul(b) {
            return Some(Value::Number(Number::from(product)));
        }
    }
    let product = left.as_f64()? * right.as_f64()?;
    Number::from_f64(product).map(Value::Number)
}

/// Text form of a scalar, as written to flat files and compared by the
/// flat-file dialect.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Truthiness used by `$project` include flags.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::Null => false,
        _ => true,
    }
}
