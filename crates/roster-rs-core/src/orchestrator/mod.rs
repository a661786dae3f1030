//! Pipeline orchestrator: intake, classification, translation, execution and
//! response composition for one command at a time.

mod sessions;

use crate::classifier::{IntentClassifier, LlmClassifier, build_llm};
use crate::context::ContextStore;
use crate::error::RosterCoreError;
use crate::executor::QueryExecutor;
use crate::prompt::augment_prompt;
use crate::translator::{IntentTranslator, Step};
use log::{debug, error, info, warn};
use roster_rs_config::RosterConfig;
use roster_rs_protocol::{
    Action, ClarificationDetails, CommandMeta, CommandRequest, CommandResponse, ErrorBody,
    ErrorKind, ExecutionResult, IntentKind, Operation, SessionContext, StepReport,
};
use sessions::{SessionGate, build_context_store};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

const DEFAULT_CLARIFICATION: &str = "Could you clarify what you would like to do?";

/// Outcome of a command before metadata is attached.
enum Outcome {
    Success {
        response: String,
        results: Vec<StepReport>,
    },
    Clarification {
        message: String,
        suggestions: Vec<String>,
    },
}

/// A command failure surfaced to the caller.
struct Failure {
    kind: ErrorKind,
    message: String,
}

impl Failure {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Runs commands end to end and owns the session context.
pub struct Orchestrator {
    config: Arc<RosterConfig>,
    classifier: Arc<dyn IntentClassifier>,
    translator: IntentTranslator,
    executor: Arc<QueryExecutor>,
    contexts: Arc<dyn ContextStore>,
    gate: SessionGate,
}

impl Orchestrator {
    /// Construct an orchestrator; the executor and the context store are
    /// built from config unless supplied.
    pub fn new(
        config: RosterConfig,
        classifier: Arc<dyn IntentClassifier>,
        executor: Option<Arc<QueryExecutor>>,
        contexts: Option<Arc<dyn ContextStore>>,
    ) -> Result<Self, RosterCoreError> {
        info!("initializing orchestrator");
        debug!(
            "orchestrator config (collection={}, sessions={:?}, serialize_commands={})",
            config.store.collection, config.sessions.provider, config.sessions.serialize_commands
        );
        let executor = match executor {
            Some(executor) => executor,
            None => Arc::new(QueryExecutor::from_config(&config)?),
        };
        let contexts = match contexts {
            Some(contexts) => contexts,
            None => build_context_store(&config.sessions)?,
        };
        Ok(Self {
            translator: IntentTranslator::new(config.store.collection.clone()),
            config: Arc::new(config),
            classifier,
            executor,
            contexts,
            gate: SessionGate::default(),
        })
    }

    /// Construct an orchestrator with the configured language model.
    pub fn from_config(config: RosterConfig) -> Result<Self, RosterCoreError> {
        let llm = build_llm(&config.classifier)?;
        let classifier = Arc::new(LlmClassifier::from_config(llm, &config.classifier));
        Self::new(config, classifier, None, None)
    }

    pub fn config(&self) -> &RosterConfig {
        &self.config
    }

    /// Session id used when a command carries none.
    pub fn default_session_id(&self) -> &str {
        &self.config.sessions.default_session_id
    }

    /// Current context of a session.
    pub fn session_context(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionContext>, RosterCoreError> {
        Ok(self.contexts.get(session_id)?)
    }

    /// Forget the context of a session; returns whether one existed.
    pub fn clear_session_context(&self, session_id: &str) -> Result<bool, RosterCoreError> {
        info!("clearing session context (session_id={session_id})");
        Ok(self.contexts.clear(session_id)?)
    }

    /// Privileged deletion of every record in a collection.
    pub async fn purge(&self, collection: &str, confirmation: &str) -> Result<usize, RosterCoreError> {
        Ok(self.executor.purge(collection, confirmation).await?)
    }

    /// Run one command and compose its response. Never fails: errors are
    /// reported in the response body.
    pub async fn handle(&self, request: CommandRequest) -> CommandResponse {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let session_id = request
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(self.default_session_id())
            .to_string();
        info!("command received (request_id={request_id}, session_id={session_id})");

        let outcome = self.run(request_id, &session_id, &request).await;
        let meta = CommandMeta {
            request_id,
            session_id,
            original_prompt: request.prompt.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        match outcome {
            Ok(Outcome::Success { response, results }) => {
                info!(
                    "command completed (request_id={request_id}, steps={}, duration_ms={})",
                    results.len(),
                    meta.duration_ms
                );
                CommandResponse::Success {
                    response,
                    results,
                    meta,
                }
            }
            Ok(Outcome::Clarification {
                message,
                suggestions,
            }) => {
                info!("command needs clarification (request_id={request_id})");
                CommandResponse::Clarification {
                    message,
                    details: ClarificationDetails { suggestions },
                    meta,
                }
            }
            Err(failure) => {
                warn!(
                    "command failed (request_id={request_id}, kind={}, message={})",
                    failure.kind, failure.message
                );
                CommandResponse::Error {
                    error: ErrorBody {
                        kind: failure.kind,
                        message: failure.message,
                    },
                    meta,
                }
            }
        }
    }

    async fn run(
        &self,
        request_id: Uuid,
        session_id: &str,
        request: &CommandRequest,
    ) -> Result<Outcome, Failure> {
        if request.prompt_text().is_none() && request.file.is_none() {
            return Err(Failure::new(
                ErrorKind::Input,
                "a prompt or an attached file is required",
            ));
        }
        let prompt = augment_prompt(request.prompt_text(), request.file.as_ref());

        let _guard = if self.config.sessions.serialize_commands {
            Some(self.gate.acquire(session_id).await)
        } else {
            None
        };

        let context = self.contexts.get(session_id).map_err(|err| {
            error!("failed to load session context (request_id={request_id}, error={err})");
            Failure::new(ErrorKind::Internal, "session context unavailable")
        })?;
        let snapshot = SessionContext::snapshot(context.as_ref());

        let intents = self.classifier.classify(&prompt, &snapshot).await;
        debug!(
            "classified prompt (request_id={request_id}, intents={})",
            intents.len()
        );
        let Some(first) = intents.first() else {
            return Err(Failure::new(
                ErrorKind::Classification,
                "the request could not be classified",
            ));
        };
        match first.kind {
            IntentKind::Error => {
                return Err(Failure::new(
                    ErrorKind::Classification,
                    first
                        .message
                        .clone()
                        .unwrap_or_else(|| "the request could not be classified".to_string()),
                ));
            }
            IntentKind::Ambiguous => {
                return Ok(Outcome::Clarification {
                    message: first
                        .message
                        .clone()
                        .filter(|message| !message.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_CLARIFICATION.to_string()),
                    suggestions: first.suggestions.clone(),
                });
            }
            _ => {}
        }

        let steps = self.translator.translate(&intents).map_err(|err| {
            warn!("translation rejected (request_id={request_id}, error={err})");
            Failure::new(ErrorKind::Translation, err.to_string())
        })?;

        let mut results = Vec::with_capacity(steps.len());
        for step in steps {
            let report = match step {
                Step::Reply { message } => StepReport {
                    action: None,
                    collection: None,
                    filter: None,
                    update: None,
                    pipeline: None,
                    data: None,
                    result: ExecutionResult::Chat { message },
                },
                Step::Operation(operation) => {
                    self.run_operation(request_id, session_id, operation).await?
                }
            };
            results.push(report);
        }

        let response = summarize(&results);
        Ok(Outcome::Success { response, results })
    }

    async fn run_operation(
        &self,
        request_id: Uuid,
        session_id: &str,
        operation: Operation,
    ) -> Result<StepReport, Failure> {
        let result = if operation.action == Action::Unknown {
            ExecutionResult::Processed {
                reason: operation
                    .reason
                    .clone()
                    .unwrap_or_else(|| "request not processed".to_string()),
            }
        } else {
            self.executor.execute(&operation).await.map_err(|err| {
                error!(
                    "operation failed (request_id={request_id}, action={}, collection={}, error={err})",
                    operation.action, operation.collection
                );
                Failure::new(ErrorKind::Execution, err.to_string())
            })?
        };

        let context_update = if operation.action.is_read() {
            let context = SessionContext::new(
                operation.action,
                operation.filter_or_pipeline(),
                result.count(),
            );
            self.contexts.set(session_id, context)
        } else if operation.action.is_destructive() {
            self.contexts.clear(session_id).map(|_| ())
        } else {
            Ok(())
        };
        context_update.map_err(|err| {
            error!("failed to update session context (request_id={request_id}, error={err})");
            Failure::new(ErrorKind::Internal, "session context could not be updated")
        })?;

        Ok(step_report(operation, result))
    }
}

/// Record what an operation ran with next to its result.
fn step_report(operation: Operation, result: ExecutionResult) -> StepReport {
    let action = operation.action;
    let uses_filter = matches!(
        action,
        Action::Find | Action::UpdateMany | Action::DeleteMany
    );
    StepReport {
        action: Some(action),
        collection: Some(operation.collection),
        filter: uses_filter.then_some(operation.filter),
        update: operation.update.map(|update| update.to_document()),
        pipeline: (action == Action::Aggregate).then_some(operation.pipeline),
        data: matches!(action, Action::InsertMany | Action::Create).then_some(operation.data),
        result,
    }
}

/// Summary sentence taken from the first result.
fn summarize(results: &[StepReport]) -> String {
    match results.first() {
        Some(report) => report
            .result
            .message()
            .unwrap_or_else(|| format!("Found {} matching records", report.result.count())),
        None => "Nothing to do".to_string(),
    }
}
