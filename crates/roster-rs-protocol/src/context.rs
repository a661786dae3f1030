//! Session context carried between conversational turns.

use crate::Action;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Last read/aggregate of a session. Either stored whole or absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub last_action: Action,
    /// Filter object for finds, stage array for aggregates.
    pub last_filter_or_pipeline: Value,
    pub result_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(last_action: Action, last_filter_or_pipeline: Value, result_count: usize) -> Self {
        Self {
            last_action,
            last_filter_or_pipeline,
            result_count,
            updated_at: Utc::now(),
        }
    }

    /// Snapshot handed to the classifier; `{}` when there is no context.
    pub fn snapshot(context: Option<&SessionContext>) -> Value {
        match context {
            Some(context) => serde_json::json!({
                "lastAction": context.last_action,
                "lastFilterOrPipeline": context.last_filter_or_pipeline,
                "resultCount": context.result_count,
            }),
            None => Value::Object(serde_json::Map::new()),
        }
    }
}
