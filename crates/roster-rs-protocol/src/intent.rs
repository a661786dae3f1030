//! Classified intents produced from free-text prompts.

use crate::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Database intent recognized by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IntentKind {
    /// Filtered read.
    Read,
    /// Insert one or many records.
    Write,
    /// Bulk update by filter.
    Update,
    /// Bulk delete by filter.
    Delete,
    /// Aggregation pipeline.
    Aggregate,
    /// Vague request that needs clarification.
    Ambiguous,
    /// Request to delete every record.
    DeleteAll,
    /// Conversational prompt unrelated to the data.
    NonDb,
    /// Conversational reply produced by the model.
    Chat,
    /// Classification failure.
    Error,
    /// Kind string the pipeline does not recognize.
    Other(String),
}

impl IntentKind {
    /// Wire representation of the kind.
    pub fn as_str(&self) -> &str {
        match self {
            IntentKind::Read => "READ",
            IntentKind::Write => "WRITE",
            IntentKind::Update => "UPDATE",
            IntentKind::Delete => "DELETE",
            IntentKind::Aggregate => "AGGREGATE",
            IntentKind::Ambiguous => "AMBIGUOUS",
            IntentKind::DeleteAll => "DELETE_ALL",
            IntentKind::NonDb => "NON_DB",
            IntentKind::Chat => "CHAT",
            IntentKind::Error => "ERROR",
            IntentKind::Other(value) => value.as_str(),
        }
    }

    /// True for the kinds answered without touching the store.
    pub fn is_conversational(&self) -> bool {
        matches!(
            self,
            IntentKind::NonDb | IntentKind::Chat | IntentKind::Ambiguous
        )
    }
}

impl From<String> for IntentKind {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "READ" => IntentKind::Read,
            "WRITE" => IntentKind::Write,
            "UPDATE" => IntentKind::Update,
            "DELETE" => IntentKind::Delete,
            "AGGREGATE" => IntentKind::Aggregate,
            "AMBIGUOUS" => IntentKind::Ambiguous,
            "DELETE_ALL" => IntentKind::DeleteAll,
            "NON_DB" => IntentKind::NonDb,
            "CHAT" => IntentKind::Chat,
            "ERROR" => IntentKind::Error,
            _ => IntentKind::Other(value),
        }
    }
}

impl From<&str> for IntentKind {
    fn from(value: &str) -> Self {
        IntentKind::from(value.to_string())
    }
}

impl From<IntentKind> for String {
    fn from(kind: IntentKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write or update payload carried by an intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntentData {
    /// A single object (one record, or one update payload).
    One(Document),
    /// A batch of records.
    Many(Vec<Document>),
}

impl IntentData {
    /// True when there is nothing to write.
    pub fn is_empty(&self) -> bool {
        match self {
            IntentData::One(doc) => doc.is_empty(),
            IntentData::Many(docs) => docs.is_empty() || docs.iter().all(|doc| doc.is_empty()),
        }
    }
}

/// Structured interpretation of a prompt, produced by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub kind: IntentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<IntentData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Vec<Document>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Document>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// Free-text message (error detail, clarification question, chat reply).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Intent {
    /// Create an intent of the given kind with no payload.
    pub fn new(kind: IntentKind) -> Self {
        Self {
            kind,
            collection: None,
            filter: None,
            data: None,
            pipeline: None,
            projection: None,
            suggestions: Vec::new(),
            message: None,
        }
    }

    /// Build the single ERROR intent used for classification failures.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(IntentKind::Error)
        }
    }

    pub fn with_filter(mut self, filter: Document) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_data(mut self, data: IntentData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_pipeline(mut self, pipeline: Vec<Document>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Filter as a JSON value, `{}` when absent.
    pub fn filter_value(&self) -> Value {
        Value::Object(self.filter.clone().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::{Intent, IntentData, IntentKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn kind_parses_case_insensitively_and_keeps_unknown_values() {
        assert_eq!(IntentKind::from("read"), IntentKind::Read);
        assert_eq!(IntentKind::from("DELETE_ALL"), IntentKind::DeleteAll);
        assert_eq!(
            IntentKind::from("EXPORT"),
            IntentKind::Other("EXPORT".to_string())
        );
        assert_eq!(IntentKind::Other("EXPORT".to_string()).as_str(), "EXPORT");
    }

    #[test]
    fn intent_serializes_with_wire_names() {
        let filter = json!({ "department": "Sales" });
        let intent = Intent::new(IntentKind::Read)
            .with_filter(filter.as_object().cloned().unwrap_or_default());
        let value = serde_json::to_value(&intent).expect("serialize");
        assert_eq!(
            value,
            json!({ "kind": "READ", "filter": { "department": "Sales" } })
        );
    }

    #[test]
    fn intent_data_reports_emptiness() {
        assert!(IntentData::Many(Vec::new()).is_empty());
        assert!(IntentData::One(Default::default()).is_empty());
        let record = json!({ "name": "Ada" }).as_object().cloned().unwrap_or_default();
        assert!(!IntentData::Many(vec![record]).is_empty());
    }
}
