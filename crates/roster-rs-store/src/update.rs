//! Update operator application: `$set $unset $inc $mul $min $max`.

use crate::StoreError;
use crate::value::{add_numbers, compare_values, lookup, mul_numbers, remove_path, set_path};
use roster_rs_protocol::Document;
use serde_json::{Map, Value};
use std::cmp::Ordering;

const SUPPORTED: &[&str] = &["$set", "$unset", "$inc", "$mul", "$min", "$max"];

/// Check an update document before it touches any record, so a bad update
/// never applies partially.
pub fn validate_update(update: &Document) -> Result<(), StoreError> {
    if update.is_empty() {
        return Err(StoreError::InvalidUpdate("update is empty".to_string()));
    }
    for (operator, fields) in update {
        if !operator.starts_with('$') {
            return Err(StoreError::InvalidUpdate(format!(
                "expected an update operator, found field `{operator}`"
            )));
        }
        if !SUPPORTED.contains(&operator.as_str()) {
            return Err(StoreError::UnsupportedOperator(operator.clone()));
        }
        let Value::Object(fields) = fields else {
            return Err(StoreError::InvalidUpdate(format!(
                "{operator} expects an object"
            )));
        };
        if fields.is_empty() {
            return Err(StoreError::InvalidUpdate(format!("{operator} has no fields")));
        }
        if matches!(operator.as_str(), "$inc" | "$mul") {
            if let Some((field, _)) = fields.iter().find(|(_, value)| !value.is_number()) {
                return Err(StoreError::InvalidUpdate(format!(
                    "{operator} on `{field}` expects a number"
                )));
            }
        }
    }
    Ok(())
}

/// Apply a validated update to one record. Returns whether the record changed.
pub fn apply_update(doc: &mut Document, update: &Document) -> Result<bool, StoreError> {
    let before = doc.clone();
    for (operator, fields) in update {
        let Value::Object(fields) = fields else {
            continue;
        };
        match operator.as_str() {
            "$set" => apply_each(doc, fields, |_, value| Ok(Some(value.clone())))?,
            "$unset" => {
                for field in fields.keys() {
                    remove_path(doc, field);
                }
            }
            "$inc" => apply_each(doc, fields, |current, amount| {
                arithmetic(current, amount, "$inc", add_numbers, amount.clone())
            })?,
            "$mul" => apply_each(doc, fields, |current, factor| {
                arithmetic(current, factor, "$mul", mul_numbers, Value::from(0))
            })?,
            "$min" => apply_each(doc, fields, |current, bound| {
                Ok(replace_when(current, bound, Ordering::Less))
            })?,
            "$max" => apply_each(doc, fields, |current, bound| {
                Ok(replace_when(current, bound, Ordering::Greater))
            })?,
            other => return Err(StoreError::UnsupportedOperator(other.to_string())),
        }
    }
    Ok(*doc != before)
}

/// Compute a new value per field and write it back; `None` leaves the field.
fn apply_each(
    doc: &mut Document,
    fields: &Map<String, Value>,
    compute: impl Fn(Option<&Value>, &Value) -> Result<Option<Value>, StoreError>,
) -> Result<(), StoreError> {
    for (field, operand) in fields {
        if let Some(next) = compute(lookup(doc, field), operand)? {
            if !set_path(doc, field, next) {
                return Err(StoreError::InvalidUpdate(format!(
                    "cannot set `{field}` through a non-object value"
                )));
            }
        }
    }
    Ok(())
}

fn arithmetic(
    current: Option<&Value>,
    operand: &Value,
    operator: &str,
    op: fn(&serde_json::Number, &serde_json::Number) -> Option<Value>,
    when_missing: Value,
) -> Result<Option<Value>, StoreError> {
    let Value::Number(operand) = operand else {
        return Err(StoreError::InvalidUpdate(format!("{operator} expects a number")));
    };
    match current {
        None | Some(Value::Null) => Ok(Some(when_missing)),
        Some(Value::Number(existing)) => op(existing, operand).map(Some).ok_or_else(|| {
            StoreError::InvalidUpdate(format!("{operator} produced a non-finite number"))
        }),
        Some(_) => Err(StoreError::InvalidUpdate(format!(
            "{operator} applied to a non-numeric field"
        ))),
    }
}

/// `$min`/`$max`: replace when the bound orders `wanted` relative to the
/// current value, or when the field is missing.
fn replace_when(current: Option<&Value>, bound: &Value, wanted: Ordering) -> Option<Value> {
    match current {
        None => Some(bound.clone()),
        Some(existing) => match compare_values(bound, existing) {
            Some(ordering) if ordering == wanted => Some(bound.clone()),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_update, validate_update};
    use crate::StoreError;
    use pretty_assertions::assert_eq;
    use roster_rs_protocol::Document;
    use serde_json::{Value, json};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn relative_updates_apply_to_existing_values() {
        let mut record = doc(json!({ "salary_usd": 1000, "bonus_usd": 200, "sick_days": 3 }));
        let update = doc(json!({
            "$inc": { "sick_days": 1 },
            "$mul": { "bonus_usd": 1.5 },
            "$set": { "location": "Remote" }
        }));
        validate_update(&update).expect("valid");
        assert!(apply_update(&mut record, &update).expect("apply"));
        assert_eq!(
            Value::Object(record),
            json!({
                "salary_usd": 1000,
                "bonus_usd": 300.0,
                "sick_days": 4,
                "location": "Remote"
            })
        );
    }

    #[test]
    fn min_and_max_only_move_in_one_direction() {
        let mut record = doc(json!({ "weekly_hours": 40 }));
        let lower = doc(json!({ "$max": { "weekly_hours": 35 } }));
        assert!(!apply_update(&mut record, &lower).expect("apply"));
        let raise = doc(json!({ "$max": { "weekly_hours": 45 }, "$min": { "training_hours": 8 } }));
        assert!(apply_update(&mut record, &raise).expect("apply"));
        assert_eq!(
            Value::Object(record),
            json!({ "weekly_hours": 45, "training_hours": 8 })
        );
    }

    #[test]
    fn unset_removes_fields() {
        let mut record = doc(json!({ "termination_date": "2024-01-01", "name": "Ada" }));
        let update = doc(json!({ "$unset": { "termination_date": "" } }));
        assert!(apply_update(&mut record, &update).expect("apply"));
        assert_eq!(Value::Object(record), json!({ "name": "Ada" }));
    }

    #[test]
    fn validation_rejects_bare_fields_and_unknown_operators() {
        assert!(matches!(
            validate_update(&doc(json!({ "salary_usd": 1 }))),
            Err(StoreError::InvalidUpdate(_))
        ));
        assert!(matches!(
            validate_update(&doc(json!({ "$rename": { "a": "b" } }))),
            Err(StoreError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            validate_update(&doc(json!({ "$inc": { "sick_days": "one" } }))),
            Err(StoreError::InvalidUpdate(_))
        ));
    }
}
