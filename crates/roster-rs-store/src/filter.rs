//! Filter evaluation for the two store dialects.
//!
//! The document dialect understands literal equality, comparison and set
//! operators, `$exists`, `$regex` and the `$and`/`$or`/`$nor` combinators;
//! unknown operators are errors. The flat-file dialect only understands
//! case-insensitive literal equality and `$gt $gte $lt $lte $ne $in`; any
//! other shape simply does not match.

use crate::StoreError;
use crate::value::{compare_values, lookup, scalar_text, values_equal};
use regex::RegexBuilder;
use roster_rs_protocol::{Document, is_operator_key};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Which filter language a store speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDialect {
    Document,
    FlatFile,
}

/// Evaluate `filter` against `doc`. An empty filter matches everything.
pub fn matches(doc: &Document, filter: &Document, dialect: FilterDialect) -> Result<bool, StoreError> {
    match dialect {
        FilterDialect::Document => matches_document(doc, filter),
        FilterDialect::FlatFile => Ok(matches_flat(doc, filter)),
    }
}

fn matches_document(doc: &Document, filter: &Document) -> Result<bool, StoreError> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => {
                let clauses = clause_list(key, condition)?;
                let mut all = true;
                for clause in clauses {
                    if !matches_document(doc, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let clauses = clause_list(key, condition)?;
                let mut any = false;
                for clause in clauses {
                    if matches_document(doc, clause)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let clauses = clause_list(key, condition)?;
                let mut none = true;
                for clause in clauses {
                    if matches_document(doc, clause)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            other if is_operator_key(other) => {
                return Err(StoreError::UnsupportedOperator(other.to_string()));
            }
            field => matches_field(lookup(doc, field), condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clause_list<'a>(key: &str, value: &'a Value) -> Result<Vec<&'a Document>, StoreError> {
    let Value::Array(items) = value else {
        return Err(StoreError::InvalidFilter(format!("{key} expects an array")));
    };
    if items.is_empty() {
        return Err(StoreError::InvalidFilter(format!(
            "{key} expects a non-empty array"
        )));
    }
    items
        .iter()
        .map(|item| {
            item.as_object()
                .ok_or_else(|| StoreError::InvalidFilter(format!("{key} entries must be objects")))
        })
        .collect()
}

/// True when a condition object is an operator expression (`{$gt: 4}`).
fn is_operator_expression(condition: &Value) -> Option<&Map<String, Value>> {
    match condition {
        Value::Object(map) if !map.is_empty() && map.keys().all(|key| is_operator_key(key)) => {
            Some(map)
        }
        _ => None,
    }
}

fn matches_field(field: Option<&Value>, condition: &Value) -> Result<bool, StoreError> {
    let Some(operators) = is_operator_expression(condition) else {
        return Ok(equals_literal(field, condition));
    };
    for (operator, operand) in operators {
        let matched = match operator.as_str() {
            "$eq" => equals_literal(field, operand),
            "$ne" => !equals_literal(field, operand),
            "$gt" => compares(field, operand, |ord| ord == Ordering::Greater),
            "$gte" => compares(field, operand, |ord| ord != Ordering::Less),
            "$lt" => compares(field, operand, |ord| ord == Ordering::Less),
            "$lte" => compares(field, operand, |ord| ord != Ordering::Greater),
            "$in" => operand_list(operator, operand)?
                .iter()
                .any(|candidate| equals_literal(field, candidate)),
            "$nin" => !operand_list(operator, operand)?
                .iter()
                .any(|candidate| equals_literal(field, candidate)),
            "$exists" => {
                let wanted = operand.as_bool().unwrap_or(true);
                field.is_some() == wanted
            }
            "$regex" => {
                let options = operators.get("$options").and_then(Value::as_str);
                regex_matches(field, operand, options.unwrap_or(""))?
            }
            "$options" => {
                if !operators.contains_key("$regex") {
                    return Err(StoreError::InvalidFilter(
                        "$options requires $regex".to_string(),
                    ));
                }
                true
            }
            other => return Err(StoreError::UnsupportedOperator(other.to_string())),
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn operand_list<'a>(operator: &str, operand: &'a Value) -> Result<&'a Vec<Value>, StoreError> {
    operand
        .as_array()
        .ok_or_else(|| StoreError::InvalidFilter(format!("{operator} expects an array")))
}

/// Equality against a literal; array fields match when any element does.
fn equals_literal(field: Option<&Value>, literal: &Value) -> bool {
    match field {
        None => literal.is_null(),
        Some(value) if values_equal(value, literal) => true,
        Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, literal)),
        Some(_) => false,
    }
}

fn compares(field: Option<&Value>, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    match field {
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| compare_values(item, operand).is_some_and(&accept)),
        Some(value) => compare_values(value, operand).is_some_and(accept),
        None => false,
    }
}

fn regex_matches(field: Option<&Value>, pattern: &Value, options: &str) -> Result<bool, StoreError> {
    let Some(pattern) = pattern.as_str() else {
        return Err(StoreError::InvalidFilter("$regex expects a string".to_string()));
    };
    let mut builder = RegexBuilder::new(pattern);
    for flag in options.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => {
                return Err(StoreError::InvalidFilter(format!(
                    "unsupported $options flag: {other}"
                )));
            }
        };
    }
    let regex = builder
        .build()
        .map_err(|err| StoreError::InvalidFilter(err.to_string()))?;
    Ok(match field {
        Some(Value::String(text)) => regex.is_match(text),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|text| regex.is_match(text)),
        _ => false,
    })
}

fn matches_flat(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| {
        if is_operator_key(key) {
            return false;
        }
        let field = lookup(doc, key);
        match condition {
            Value::Object(operators) => {
                !operators.is_empty()
                    && operators
                        .iter()
                        .all(|(operator, operand)| flat_operator(field, operator, operand))
            }
            Value::Array(_) => false,
            literal => flat_equals(field, literal),
        }
    })
}

fn flat_operator(field: Option<&Value>, operator: &str, operand: &Value) -> bool {
    match operator {
        "$ne" => !flat_equals(field, operand),
        "$in" => operand
            .as_array()
            .is_some_and(|items| items.iter().any(|item| flat_equals(field, item))),
        "$gt" => flat_compare(field, operand) == Some(Ordering::Greater),
        "$gte" => matches!(
            flat_compare(field, operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        "$lt" => flat_compare(field, operand) == Some(Ordering::Less),
        "$lte" => matches!(
            flat_compare(field, operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
        _ => false,
    }
}

fn flat_equals(field: Option<&Value>, literal: &Value) -> bool {
    if literal.is_object() || literal.is_array() {
        return false;
    }
    let expected = scalar_text(literal);
    match field {
        Some(value) if !value.is_object() && !value.is_array() => {
            scalar_text(value).eq_ignore_ascii_case(&expected)
                || values_equal(value, literal)
        }
        Some(_) => false,
        None => expected.is_empty(),
    }
}

/// Numeric comparison when both sides read as numbers, string otherwise.
fn flat_compare(field: Option<&Value>, operand: &Value) -> Option<Ordering> {
    let field = field?;
    if operand.is_object() || operand.is_array() || field.is_object() || field.is_array() {
        return None;
    }
    let left = scalar_text(field);
    let right = scalar_text(operand);
    match (left.trim().parse::<f64>(), right.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b),
        _ => Some(left.cmp(&right)),
    }
}

#[cfg(test)]
mod tests {
    use super::{FilterDialect, matches};
    use crate::StoreError;
    use roster_rs_protocol::Document;
    use serde_json::{Value, json};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    fn employee() -> Document {
        doc(json!({
            "employee_id": "EMP000101",
            "name": "Ada Lovelace",
            "department": "Sales",
            "performance_score": 4.6,
            "salary_usd": 98000,
            "skills": ["negotiation", "forecasting"]
        }))
    }

    fn check(filter: Value, dialect: FilterDialect) -> bool {
        matches(&employee(), &doc(filter), dialect).expect("filter")
    }

    #[test]
    fn document_dialect_supports_comparisons_and_combinators() {
        let dialect = FilterDialect::Document;
        assert!(check(json!({}), dialect));
        assert!(check(json!({ "department": "Sales" }), dialect));
        assert!(!check(json!({ "department": "sales" }), dialect));
        assert!(check(json!({ "performance_score": { "$gt": 4, "$lte": 5 } }), dialect));
        assert!(check(
            json!({ "$or": [{ "department": "HR" }, { "salary_usd": { "$gte": 90000 } }] }),
            dialect
        ));
        assert!(check(json!({ "$nor": [{ "department": "HR" }] }), dialect));
        assert!(check(json!({ "skills": "forecasting" }), dialect));
        assert!(check(json!({ "bonus_usd": { "$exists": false } }), dialect));
        assert!(check(json!({ "department": { "$nin": ["HR", "Legal"] } }), dialect));
    }

    #[test]
    fn regex_honours_options() {
        let dialect = FilterDialect::Document;
        assert!(check(
            json!({ "name": { "$regex": "^ada", "$options": "i" } }),
            dialect
        ));
        assert!(!check(json!({ "name": { "$regex": "^ada" } }), dialect));
    }

    #[test]
    fn document_dialect_rejects_unknown_operators() {
        let err = matches(
            &employee(),
            &doc(json!({ "salary_usd": { "$near": 1 } })),
            FilterDialect::Document,
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedOperator(op) if op == "$near"));
    }

    #[test]
    fn flat_dialect_is_case_insensitive_and_numeric_aware() {
        let dialect = FilterDialect::FlatFile;
        assert!(check(json!({ "department": "sales" }), dialect));
        assert!(check(json!({ "salary_usd": { "$gt": "90000" } }), dialect));
        assert!(check(json!({ "department": { "$in": ["HR", "SALES"] } }), dialect));
        assert!(check(json!({ "department": { "$ne": "HR" } }), dialect));
    }

    #[test]
    fn flat_dialect_treats_unsupported_shapes_as_non_matching() {
        let dialect = FilterDialect::FlatFile;
        assert!(!check(json!({ "$or": [{ "department": "Sales" }] }), dialect));
        assert!(!check(json!({ "name": { "$regex": "Ada" } }), dialect));
        assert!(!check(json!({ "department": ["Sales"] }), dialect));
        assert!(!check(json!({ "department": { "$exists": true } }), dialect));
    }
}
