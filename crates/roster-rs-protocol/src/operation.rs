//! Canonical data operations and their execution results.

use crate::Document;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Storage-agnostic action of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Find,
    Aggregate,
    UpdateMany,
    InsertMany,
    Create,
    DeleteMany,
    Unknown,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Find => "find",
            Action::Aggregate => "aggregate",
            Action::UpdateMany => "updateMany",
            Action::InsertMany => "insertMany",
            Action::Create => "create",
            Action::DeleteMany => "deleteMany",
            Action::Unknown => "unknown",
        }
    }

    /// Reads whose filter or pipeline is carried into the session context.
    pub fn is_read(&self) -> bool {
        matches!(self, Action::Find | Action::Aggregate)
    }

    /// Bulk mutations that require a filter and invalidate session context.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Action::UpdateMany | Action::DeleteMany)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an update payload is applied to matching records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "fields")]
pub enum UpdateDirective {
    /// Plain field values, applied as `$set`.
    FieldAssignment(Document),
    /// Operator-keyed update (`$inc`, `$mul`, `$set`, ...) applied verbatim.
    OperatorUpdate(Document),
}

impl UpdateDirective {
    /// Classify a raw payload: operator-keyed when any key starts with `$`.
    pub fn from_payload(payload: Document) -> Self {
        if payload.keys().any(|key| crate::is_operator_key(key)) {
            UpdateDirective::OperatorUpdate(payload)
        } else {
            UpdateDirective::FieldAssignment(payload)
        }
    }

    /// Render as an operator document, wrapping field assignments in `$set`.
    pub fn to_document(&self) -> Document {
        match self {
            UpdateDirective::FieldAssignment(fields) => {
                let mut doc = Map::new();
                doc.insert("$set".to_string(), Value::Object(fields.clone()));
                doc
            }
            UpdateDirective::OperatorUpdate(ops) => ops.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            UpdateDirective::FieldAssignment(fields) => fields.is_empty(),
            UpdateDirective::OperatorUpdate(ops) => ops.is_empty(),
        }
    }
}

/// Canonical instruction derived from exactly one intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub action: Action,
    pub collection: String,
    #[serde(default)]
    pub filter: Document,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateDirective>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipeline: Vec<Document>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Document>,
    /// Why an `unknown` operation could not be mapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Operation {
    /// Create an operation with empty payload fields.
    pub fn new(action: Action, collection: impl Into<String>) -> Self {
        Self {
            action,
            collection: collection.into(),
            filter: Map::new(),
            update: None,
            pipeline: Vec::new(),
            data: Vec::new(),
            projection: None,
            reason: None,
        }
    }

    /// The filter (reads, updates, deletes) or pipeline (aggregates) this
    /// operation ran with, as carried into session context.
    pub fn filter_or_pipeline(&self) -> Value {
        match self.action {
            Action::Aggregate => Value::Array(
                self.pipeline
                    .iter()
                    .cloned()
                    .map(Value::Object)
                    .collect(),
            ),
            _ => Value::Object(self.filter.clone()),
        }
    }
}

/// Outcome of one executed (or skipped) operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ExecutionResult {
    /// Records returned by a find.
    Records {
        count: usize,
        truncated: bool,
        records: Vec<Document>,
    },
    /// Rows produced by an aggregation pipeline.
    Aggregated { count: usize, rows: Vec<Document> },
    /// Counts from a bulk update.
    Updated { matched: usize, modified: usize },
    /// Records written, identifiers populated.
    Inserted { count: usize, records: Vec<Document> },
    /// Count removed by a bulk delete.
    Deleted { deleted: usize },
    /// Operation acknowledged but not executed.
    Processed { reason: String },
    /// Conversational reply, no store access.
    Chat { message: String },
}

impl ExecutionResult {
    /// Explicit human-readable message, when the result carries one.
    pub fn message(&self) -> Option<String> {
        match self {
            ExecutionResult::Records { .. } | ExecutionResult::Aggregated { .. } => None,
            ExecutionResult::Updated { matched, modified } => Some(format!(
                "Updated {modified} record(s) ({matched} matched the filter)."
            )),
            ExecutionResult::Inserted { count, .. } => {
                Some(format!("Inserted {count} record(s)."))
            }
            ExecutionResult::Deleted { deleted } => Some(format!("Deleted {deleted} record(s).")),
            ExecutionResult::Processed { reason } => Some(reason.clone()),
            ExecutionResult::Chat { message } => Some(message.clone()),
        }
    }

    /// Number of records the result refers to.
    pub fn count(&self) -> usize {
        match self {
            ExecutionResult::Records { count, .. }
            | ExecutionResult::Aggregated { count, .. }
            | ExecutionResult::Inserted { count, .. } => *count,
            ExecutionResult::Updated { modified, .. } => *modified,
            ExecutionResult::Deleted { deleted } => *deleted,
            ExecutionResult::Processed { .. } | ExecutionResult::Chat { .. } => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, ExecutionResult, Operation, UpdateDirective};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn object(value: serde_json::Value) -> crate::Document {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn plain_payload_becomes_field_assignment() {
        let directive = UpdateDirective::from_payload(object(json!({ "salary_usd": 80000 })));
        assert_eq!(
            serde_json::Value::Object(directive.to_document()),
            json!({ "$set": { "salary_usd": 80000 } })
        );
    }

    #[test]
    fn operator_payload_is_not_wrapped() {
        let payload = object(json!({ "$mul": { "bonus_usd": 1.1 } }));
        let directive = UpdateDirective::from_payload(payload.clone());
        assert_eq!(directive, UpdateDirective::OperatorUpdate(payload.clone()));
        assert_eq!(directive.to_document(), payload);
    }

    #[test]
    fn aggregate_carries_pipeline_into_context() {
        let mut operation = Operation::new(Action::Aggregate, "employees");
        operation.pipeline = vec![object(json!({ "$count": "total" }))];
        assert_eq!(
            operation.filter_or_pipeline(),
            json!([{ "$count": "total" }])
        );
    }

    #[test]
    fn action_serializes_in_camel_case() {
        assert_eq!(
            serde_json::to_value(Action::UpdateMany).expect("serialize"),
            json!("updateMany")
        );
        assert!(Action::DeleteMany.is_destructive());
        assert!(!Action::Create.is_destructive());
    }

    #[test]
    fn read_results_have_no_explicit_message() {
        let result = ExecutionResult::Records {
            count: 2,
            truncated: false,
            records: Vec::new(),
        };
        assert_eq!(result.message(), None);
        assert_eq!(result.count(), 2);
    }
}
