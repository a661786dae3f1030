//! In-process aggregation pipeline engine.
//!
//! Stages: `$match $project $addFields $set $group $sort $skip $limit $count
//! $unwind`. Group accumulators: `$sum $avg $min $max $first $last $push
//! $addToSet $count`. `$match` uses the filter dialect of the calling store.

use crate::StoreError;
use crate::filter::{FilterDialect, matches};
use crate::value::{is_truthy, lookup, number_value, remove_path, set_path, sort_order, values_equal};
use roster_rs_protocol::{Document, is_operator_key};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Stage names the engine accepts.
pub const SUPPORTED_STAGES: &[&str] = &[
    "$match",
    "$project",
    "$addFields",
    "$set",
    "$group",
    "$sort",
    "$skip",
    "$limit",
    "$count",
    "$unwind",
];

/// Check that every stage is a single-key object naming a supported stage.
pub fn validate_pipeline(stages: &[Document]) -> Result<(), StoreError> {
    for (index, stage) in stages.iter().enumerate() {
        let (name, _) = stage_parts(index, stage)?;
        if !SUPPORTED_STAGES.contains(&name) {
            return Err(StoreError::UnsupportedStage(name.to_string()));
        }
    }
    Ok(())
}

/// Run `stages` over `records` in order.
pub fn run_pipeline(
    records: Vec<Document>,
    stages: &[Document],
    dialect: FilterDialect,
) -> Result<Vec<Document>, StoreError> {
    validate_pipeline(stages)?;
    let mut current = records;
    for (index, stage) in stages.iter().enumerate() {
        let (name, spec) = stage_parts(index, stage)?;
        current = match name {
            "$match" => match_stage(current, spec, dialect)?,
            "$project" => project_stage(current, spec)?,
            "$addFields" | "$set" => add_fields_stage(current, spec)?,
            "$group" => group_stage(current, spec)?,
            "$sort" => sort_stage(current, spec)?,
            "$skip" => {
                let skip = count_operand(name, spec)?;
                current.into_iter().skip(skip).collect()
            }
            "$limit" => {
                let limit = count_operand(name, spec)?;
                if limit == 0 {
                    return Err(StoreError::InvalidPipeline(
                        "$limit must be positive".to_string(),
                    ));
                }
                current.into_iter().take(limit).collect()
            }
            "$count" => count_stage(current.len(), spec)?,
            "$unwind" => unwind_stage(current, spec)?,
            other => return Err(StoreError::UnsupportedStage(other.to_string())),
        };
    }
    Ok(current)
}

fn stage_parts(index: usize, stage: &Document) -> Result<(&str, &Value), StoreError> {
    let mut entries = stage.iter();
    match (entries.next(), entries.next()) {
        (Some((name, spec)), None) if is_operator_key(name) => Ok((name.as_str(), spec)),
        _ => Err(StoreError::InvalidPipeline(format!(
            "stage {index} must be an object with exactly one `$` key"
        ))),
    }
}

fn spec_object<'a>(name: &str, spec: &'a Value) -> Result<&'a Map<String, Value>, StoreError> {
    spec.as_object()
        .ok_or_else(|| StoreError::InvalidPipeline(format!("{name} expects an object")))
}

fn count_operand(name: &str, spec: &Value) -> Result<usize, StoreError> {
    spec.as_u64()
        .map(|value| value as usize)
        .ok_or_else(|| StoreError::InvalidPipeline(format!("{name} expects a non-negative integer")))
}

fn match_stage(
    records: Vec<Document>,
    spec: &Value,
    dialect: FilterDialect,
) -> Result<Vec<Document>, StoreError> {
    let filter = spec_object("$match", spec)?;
    let mut kept = Vec::new();
    for record in records {
        if matches(&record, filter, dialect)? {
            kept.push(record);
        }
    }
    Ok(kept)
}

fn project_stage(records: Vec<Document>, spec: &Value) -> Result<Vec<Document>, StoreError> {
    let spec = spec_object("$project", spec)?;
    if spec.is_empty() {
        return Err(StoreError::InvalidPipeline(
            "$project needs at least one field".to_string(),
        ));
    }
    let is_exclusion = |value: &Value| matches!(value, Value::Bool(_) | Value::Number(_)) && !is_truthy(value);
    let inclusion = spec
        .iter()
        .any(|(field, value)| field != "_id" && !is_exclusion(value));

    records
        .into_iter()
        .map(|record| {
            if !inclusion {
                let mut projected = record;
                for field in spec.keys() {
                    remove_path(&mut projected, field);
                }
                return Ok(projected);
            }
            let mut projected = Map::new();
            let keep_id = spec.get("_id").is_none_or(|value| !is_exclusion(value));
            if keep_id {
                if let Some(id) = record.get("_id") {
                    projected.insert("_id".to_string(), id.clone());
                }
            }
            for (field, value) in spec {
                if is_exclusion(value) {
                    continue;
                }
                if matches!(value, Value::Bool(_) | Value::Number(_)) {
                    if let Some(existing) = lookup(&record, field) {
                        set_path(&mut projected, field, existing.clone());
                    }
                } else {
                    set_path(&mut projected, field, eval_expr(&record, value)?);
                }
            }
            Ok(projected)
        })
        .collect()
}

fn add_fields_stage(records: Vec<Document>, spec: &Value) -> Result<Vec<Document>, StoreError> {
    let spec = spec_object("$addFields", spec)?;
    records
        .into_iter()
        .map(|mut record| {
            for (field, expr) in spec {
                let value = eval_expr(&record, expr)?;
                set_path(&mut record, field, value);
            }
            Ok(record)
        })
        .collect()
}

fn sort_stage(mut records: Vec<Document>, spec: &Value) -> Result<Vec<Document>, StoreError> {
    let spec = spec_object("$sort", spec)?;
    let mut keys = Vec::with_capacity(spec.len());
    for (field, direction) in spec {
        let descending = match direction.as_i64() {
            Some(1) => false,
            Some(-1) => true,
            _ => {
                return Err(StoreError::InvalidPipeline(format!(
                    "$sort direction for `{field}` must be 1 or -1"
                )));
            }
        };
        keys.push((field.as_str(), descending));
    }
    records.sort_by(|left, right| {
        for (field, descending) in &keys {
            let ordering = sort_order(lookup(left, field), lookup(right, field));
            let ordering = if *descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(records)
}

fn count_stage(count: usize, spec: &Value) -> Result<Vec<Document>, StoreError> {
    let Some(name) = spec.as_str().filter(|name| !name.is_empty() && !name.starts_with('$'))
    else {
        return Err(StoreError::InvalidPipeline(
            "$count expects a field name".to_string(),
        ));
    };
    if count == 0 {
        return Ok(Vec::new());
    }
    let mut row = Map::new();
    row.insert(name.to_string(), Value::from(count));
    Ok(vec![row])
}

fn unwind_stage(records: Vec<Document>, spec: &Value) -> Result<Vec<Document>, StoreError> {
    let (path, preserve) = match spec {
        Value::String(path) => (path.as_str(), false),
        Value::Object(options) => (
            options.get("path").and_then(Value::as_str).unwrap_or(""),
            options
                .get("preserveNullAndEmptyArrays")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        ),
        _ => ("", false),
    };
    let Some(field) = path.strip_prefix('$').filter(|field| !field.is_empty()) else {
        return Err(StoreError::InvalidPipeline(
            "$unwind expects a `$field` path".to_string(),
        ));
    };

    let mut unwound = Vec::new();
    for record in records {
        match lookup(&record, field).cloned() {
            Some(Value::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = record.clone();
                    set_path(&mut copy, field, item);
                    unwound.push(copy);
                }
            }
            Some(Value::Array(_)) | Some(Value::Null) | None => {
                if preserve {
                    unwound.push(record);
                }
            }
            Some(_) => unwound.push(record),
        }
    }
    Ok(unwound)
}

fn group_stage(records: Vec<Document>, spec: &Value) -> Result<Vec<Document>, StoreError> {
    let spec = spec_object("$group", spec)?;
    let Some(id_expr) = spec.get("_id") else {
        return Err(StoreError::InvalidPipeline(
            "$group requires an `_id`".to_string(),
        ));
    };

    let mut fields = Vec::new();
    for (field, accumulator) in spec.iter().filter(|(field, _)| *field != "_id") {
        let parsed = accumulator
            .as_object()
            .filter(|map| map.len() == 1)
            .and_then(|map| map.iter().next())
            .ok_or_else(|| {
                StoreError::InvalidPipeline(format!(
                    "$group field `{field}` must be a single accumulator object"
                ))
            })?;
        let kind = AccumulatorKind::parse(parsed.0)?;
        fields.push((field.clone(), kind, parsed.1));
    }

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(Value, Vec<Accumulator>)> = Vec::new();
    for record in &records {
        let key = eval_expr(record, id_expr)?;
        let slot = *index.entry(key.to_string()).or_insert_with(|| {
            groups.push((
                key.clone(),
                fields.iter().map(|(_, kind, _)| Accumulator::new(*kind)).collect(),
            ));
            groups.len() - 1
        });
        for (position, (_, _, expr)) in fields.iter().enumerate() {
            let value = eval_expr(record, expr)?;
            groups[slot].1[position].push(value);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, accumulators)| {
            let mut row = Map::new();
            row.insert("_id".to_string(), key);
            for ((field, _, _), accumulator) in fields.iter().zip(accumulators) {
                row.insert(field.clone(), accumulator.finish());
            }
            row
        })
        .collect())
}

#[derive(Debug, Clone, Copy)]
enum AccumulatorKind {
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
    Push,
    AddToSet,
    Count,
}

impl AccumulatorKind {
    fn parse(name: &str) -> Result<Self, StoreError> {
        Ok(match name {
            "$sum" => Self::Sum,
            "$avg" => Self::Avg,
            "$min" => Self::Min,
            "$max" => Self::Max,
            "$first" => Self::First,
            "$last" => Self::Last,
            "$push" => Self::Push,
            "$addToSet" => Self::AddToSet,
            "$count" => Self::Count,
            other => return Err(StoreError::UnsupportedOperator(other.to_string())),
        })
    }
}

/// Running state of one accumulator within one group.
#[derive(Debug)]
enum Accumulator {
    Sum(f64),
    Avg { total: f64, count: usize },
    Min(Option<Value>),
    Max(Option<Value>),
    First(Option<Value>),
    Last(Value),
    Push(Vec<Value>),
    AddToSet(Vec<Value>),
    Count(usize),
}

impl Accumulator {
    fn new(kind: AccumulatorKind) -> Self {
        match kind {
            AccumulatorKind::Sum => Self::Sum(0.0),
            AccumulatorKind::Avg => Self::Avg { total: 0.0, count: 0 },
            AccumulatorKind::Min => Self::Min(None),
            AccumulatorKind::Max => Self::Max(None),
            AccumulatorKind::First => Self::First(None),
            AccumulatorKind::Last => Self::Last(Value::Null),
            AccumulatorKind::Push => Self::Push(Vec::new()),
            AccumulatorKind::AddToSet => Self::AddToSet(Vec::new()),
            AccumulatorKind::Count => Self::Count(0),
        }
    }

    fn push(&mut self, value: Value) {
        match self {
            Self::Sum(total) => {
                if let Some(number) = value.as_f64() {
                    *total += number;
                }
            }
            Self::Avg { total, count } => {
                if let Some(number) = value.as_f64() {
                    *total += number;
                    *count += 1;
                }
            }
            Self::Min(current) => keep_extreme(current, value, Ordering::Less),
            Self::Max(current) => keep_extreme(current, value, Ordering::Greater),
            Self::First(current) => {
                if current.is_none() {
                    *current = Some(value);
                }
            }
            Self::Last(current) => *current = value,
            Self::Push(items) => items.push(value),
            Self::AddToSet(items) => {
                if !items.iter().any(|item| values_equal(item, &value)) {
                    items.push(value);
                }
            }
            Self::Count(count) => *count += 1,
        }
    }

    fn finish(self) -> Value {
        match self {
            Self::Sum(total) => number_value(total),
            Self::Avg { total, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    Number::from_f64(total / count as f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            }
            Self::Min(value) | Self::Max(value) | Self::First(value) => {
                value.unwrap_or(Value::Null)
            }
            Self::Last(value) => value,
            Self::Push(items) | Self::AddToSet(items) => Value::Array(items),
            Self::Count(count) => Value::from(count),
        }
    }
}

fn keep_extreme(current: &mut Option<Value>, value: Value, wanted: Ordering) {
    if value.is_null() {
        return;
    }
    let replace = match current {
        None => true,
        Some(existing) => sort_order(Some(&value), Some(existing)) == wanted,
    };
    if replace {
        *current = Some(value);
    }
}

/// Evaluate an aggregation expression against one record.
pub fn eval_expr(doc: &Document, expr: &Value) -> Result<Value, StoreError> {
    match expr {
        Value::String(text) if text.starts_with('$') && text.len() > 1 => {
            Ok(lookup(doc, &text[1..]).cloned().unwrap_or(Value::Null))
        }
        Value::Object(map) if map.len() == 1 && map.keys().all(|key| is_operator_key(key)) => {
            let (operator, operand) = map.iter().next().ok_or_else(|| {
                StoreError::InvalidPipeline("empty expression".to_string())
            })?;
            eval_operator(doc, operator, operand)
        }
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                out.insert(key.clone(), eval_expr(doc, value)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| eval_expr(doc, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        literal => Ok(literal.clone()),
    }
}

fn eval_operator(doc: &Document, operator: &str, operand: &Value) -> Result<Value, StoreError> {
    if operator == "$literal" {
        return Ok(operand.clone());
    }
    let args = match operand {
        Value::Array(items) => items
            .iter()
            .map(|item| eval_expr(doc, item))
            .collect::<Result<Vec<_>, _>>()?,
        single => vec![eval_expr(doc, single)?],
    };
    let numbers = || -> Option<Vec<f64>> { args.iter().map(Value::as_f64).collect() };

    Ok(match operator {
        "$add" => numbers().map_or(Value::Null, |values| number_value(values.iter().sum())),
        "$multiply" => {
            numbers().map_or(Value::Null, |values| number_value(values.iter().product()))
        }
        "$subtract" => match numbers().as_deref() {
            Some([left, right]) => number_value(left - right),
            _ => Value::Null,
        },
        "$divide" => match numbers().as_deref() {
            Some([_, right]) if *right == 0.0 => Value::Null,
            Some([left, right]) => Number::from_f64(left / right)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        },
        "$round" => match numbers().as_deref() {
            Some([value]) => number_value(value.round()),
            Some([value, places]) => {
                let factor = 10f64.powi(*places as i32);
                let rounded = (value * factor).round() / factor;
                Number::from_f64(rounded)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
            _ => Value::Null,
        },
        "$concat" => {
            let mut joined = String::new();
            for arg in &args {
                match arg {
                    Value::String(text) => joined.push_str(text),
                    _ => return Ok(Value::Null),
                }
            }
            Value::String(joined)
        }
        "$toLower" => args
            .first()
            .and_then(Value::as_str)
            .map_or(Value::Null, |text| Value::String(text.to_lowercase())),
        "$toUpper" => args
            .first()
            .and_then(Value::as_str)
            .map_or(Value::Null, |text| Value::String(text.to_uppercase())),
        "$ifNull" => args
            .iter()
            .find(|value| !value.is_null())
            .cloned()
            .unwrap_or(Value::Null),
        other => return Err(StoreError::UnsupportedOperator(other.to_string())),
    })
}
