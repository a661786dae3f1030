//! Inbound command and outbound response envelope.

use crate::{Action, Document, ExecutionResult, SessionKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Text file attached to a command, already decoded to UTF-8.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub content: String,
}

/// A single conversational command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub session_id: Option<SessionKey>,
    #[serde(default)]
    pub file: Option<Attachment>,
}

impl CommandRequest {
    /// Command with prompt text only.
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    pub fn in_session(mut self, session_id: impl Into<SessionKey>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.file = Some(Attachment {
            name: name.into(),
            content: content.into(),
        });
        self
    }

    /// Prompt text with surrounding whitespace removed; `None` when blank.
    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt
            .as_deref()
            .map(str::trim)
            .filter(|prompt| !prompt.is_empty())
    }
}

/// What a single step of the command did, for transparency in responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    /// Action executed; absent for conversational replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Vec<Document>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Document>>,
    pub result: ExecutionResult,
}

/// Metadata attached to every response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMeta {
    pub request_id: Uuid,
    pub session_id: SessionKey,
    #[serde(default)]
    pub original_prompt: Option<String>,
    pub duration_ms: u64,
}

/// Category of a failed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Neither prompt nor file supplied.
    Input,
    /// Model output unusable or the model call failed.
    Classification,
    /// Intent could not be turned into a safe operation.
    Translation,
    /// Store failure or unsupported action.
    Execution,
    /// Anything else.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Input => "input",
            ErrorKind::Classification => "classification",
            ErrorKind::Translation => "translation",
            ErrorKind::Execution => "execution",
            ErrorKind::Internal => "internal",
        };
        f.write_str(label)
    }
}

/// Serializable error object returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

/// Suggestions offered when a request is ambiguous.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClarificationDetails {
    pub suggestions: Vec<String>,
}

/// Response to a command, tagged by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum CommandResponse {
    #[serde(rename = "Success")]
    Success {
        response: String,
        results: Vec<StepReport>,
        meta: CommandMeta,
    },
    #[serde(rename = "Clarification Needed")]
    Clarification {
        message: String,
        details: ClarificationDetails,
        meta: CommandMeta,
    },
    #[serde(rename = "Error")]
    Error { error: ErrorBody, meta: CommandMeta },
}

impl CommandResponse {
    pub fn meta(&self) -> &CommandMeta {
        match self {
            CommandResponse::Success { meta, .. }
            | CommandResponse::Clarification { meta, .. }
            | CommandResponse::Error { meta, .. } => meta,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CommandResponse::Success { .. })
    }

    /// Error kind for failed commands.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            CommandResponse::Error { error, .. } => Some(error.kind),
            _ => None,
        }
    }

    /// Human-readable text of the response whatever its status.
    pub fn text(&self) -> &str {
        match self {
            CommandResponse::Success { response, .. } => response,
            CommandResponse::Clarification { message, .. } => message,
            CommandResponse::Error { error, .. } => &error.message,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
