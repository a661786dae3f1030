//! Language-model intent classifier with a strict output validation boundary.

use crate::catalog::SchemaCatalog;
use crate::error::RosterCoreError;
use crate::prompt::{build_directive, build_user_message};
use async_trait::async_trait;
use autoagents_llm::LLMProvider;
use autoagents_llm::backends::openai::OpenAI;
use autoagents_llm::builder::LLMBuilder;
use autoagents_llm::chat::{ChatMessage, ChatProvider, ChatResponse, ChatRole, MessageType};
use log::{debug, info, warn};
use roster_rs_config::ClassifierConfig;
use roster_rs_protocol::{Document, Intent, IntentData, IntentKind, is_operator_key};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const INTENT_KEYS: &[&str] = &[
    "kind",
    "collection",
    "collectionName",
    "filter",
    "query",
    "data",
    "pipeline",
    "projection",
    "suggestions",
    "message",
    "reason",
];

/// Turns a prompt plus session context into intents. Never fails: problems
/// come back as a single ERROR intent.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, prompt: &str, context: &Value) -> Vec<Intent>;
}

/// Classifier backed by an `autoagents_llm` provider.
pub struct LlmClassifier {
    llm: Arc<dyn LLMProvider>,
    directive: String,
    timeout: Duration,
}

impl LlmClassifier {
    pub fn new(llm: Arc<dyn LLMProvider>, directive: String, timeout: Duration) -> Self {
        Self {
            llm,
            directive,
            timeout,
        }
    }

    /// Classifier over the employee catalog with the configured directive
    /// extension and timeout.
    pub fn from_config(llm: Arc<dyn LLMProvider>, config: &ClassifierConfig) -> Self {
        let directive = build_directive(
            &SchemaCatalog::employees(),
            config.append_instructions.as_deref(),
        );
        Self::new(llm, directive, Duration::from_millis(config.timeout_ms))
    }

    pub fn directive(&self) -> &str {
        &self.directive
    }
}

#[async_trait]
impl IntentClassifier for LlmClassifier {
    async fn classify(&self, prompt: &str, context: &Value) -> Vec<Intent> {
        let messages = vec![
            ChatMessage {
                role: ChatRole::System,
                message_type: MessageType::Text,
                content: self.directive.clone(),
            },
            ChatMessage {
                role: ChatRole::User,
                message_type: MessageType::Text,
                content: build_user_message(context, prompt),
            },
        ];
        let call = self.llm.chat_with_tools(&messages, None, None);
        let response = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                warn!("classifier call failed (error={err})");
                return vec![Intent::error(format!("classifier unavailable: {err}"))];
            }
            Err(_) => {
                warn!(
                    "classifier call timed out (timeout_ms={})",
                    self.timeout.as_millis()
                );
                return vec![Intent::error("classifier timed out")];
            }
        };
        let text = response.text().unwrap_or_default();
        debug!("classifier replied (chars={})", text.len());
        match parse_intents(&text) {
            Ok(intents) => intents,
            Err(reason) => {
                warn!("rejected classifier output (reason={reason})");
                vec![Intent::error(format!(
                    "could not understand the classifier output: {reason}"
                ))]
            }
        }
    }
}

/// Build the configured language model provider. The API key is read from the
/// environment variable named in the config.
pub fn build_llm(config: &ClassifierConfig) -> Result<Arc<dyn LLMProvider>, RosterCoreError> {
    let api_key = std::env::var(&config.api_key_env).map_err(|_| {
        RosterCoreError::Provider(format!("{} is not set", config.api_key_env))
    })?;
    info!(
        "building classifier provider (provider={}, model={})",
        config.provider, config.model
    );
    let llm: Arc<dyn LLMProvider> = LLMBuilder::<OpenAI>::new()
        .api_key(api_key)
        .model(config.model.clone())
        .build()
        .map_err(|err| RosterCoreError::Provider(err.to_string()))?;
    Ok(llm)
}

/// Parse raw model text into intents, rejecting anything outside the
/// expected shape.
pub fn parse_intents(raw: &str) -> Result<Vec<Intent>, String> {
    let body = strip_fences(raw);
    if body.is_empty() {
        return Err("empty response".to_string());
    }
    let value: Value =
        serde_json::from_str(body).map_err(|err| format!("invalid JSON: {err}"))?;
    let Value::Array(items) = value else {
        return Err("expected a JSON array of intents".to_string());
    };
    if items.is_empty() {
        return Err("no intents returned".to_string());
    }
    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_intent(item).map_err(|err| format!("intent {index}: {err}")))
        .collect()
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening fence line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_intent(item: &Value) -> Result<Intent, String> {
    let Value::Object(map) = item else {
        return Err("expected an object".to_string());
    };
    if let Some(key) = map.keys().find(|key| !INTENT_KEYS.contains(&key.as_str())) {
        return Err(format!("unknown key `{key}`"));
    }
    let kind = match map.get("kind") {
        Some(Value::String(kind)) if !kind.trim().is_empty() => IntentKind::from(kind.as_str()),
        Some(_) => return Err("`kind` must be a non-empty string".to_string()),
        None => return Err("missing `kind`".to_string()),
    };
    let mut intent = Intent::new(kind);
    intent.collection = optional_string(map.get("collection").or(map.get("collectionName")), "collection")?;
    intent.filter = optional_object(map.get("filter").or(map.get("query")), "filter")?;
    intent.projection = optional_object(map.get("projection"), "projection")?;
    intent.data = match map.get("data") {
        None | Some(Value::Null) => None,
        Some(Value::Object(data)) => Some(IntentData::One(data.clone())),
        Some(Value::Array(items)) => Some(IntentData::Many(
            items
                .iter()
                .map(|item| match item {
                    Value::Object(record) => Ok(record.clone()),
                    _ => Err("`data` entries must be objects".to_string()),
                })
                .collect::<Result<_, _>>()?,
        )),
        Some(_) => return Err("`data` must be an object or an array of objects".to_string()),
    };
    intent.pipeline = match map.get("pipeline") {
        None | Some(Value::Null) => None,
        Some(Value::Array(stages)) => Some(
            stages
                .iter()
                .map(parse_stage)
                .collect::<Result<_, _>>()?,
        ),
        Some(_) => return Err("`pipeline` must be an array".to_string()),
    };
    intent.suggestions = match map.get("suggestions") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| "`suggestions` must be strings".to_string())
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err("`suggestions` must be an array".to_string()),
    };
    intent.message = optional_string(map.get("message").or(map.get("reason")), "message")?;
    Ok(intent)
}

fn parse_stage(stage: &Value) -> Result<Document, String> {
    match stage {
        Value::Object(stage) if stage.len() == 1 && stage.keys().all(|key| is_operator_key(key)) => {
            Ok(stage.clone())
        }
        _ => Err("pipeline stages must be single-key `$` objects".to_string()),
    }
}

fn optional_string(value: Option<&Value>, field: &str) -> Result<Option<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(_) => Err(format!("`{field}` must be a string")),
    }
}

fn optional_object(value: Option<&Value>, field: &str) -> Result<Option<Document>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(object)) => Ok(Some(object.clone())),
        Some(_) => Err(format!("`{field}` must be an object")),
    }
}
