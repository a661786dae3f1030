//! Pure mapping from classified intents to executable steps.

use crate::error::TranslationError;
use roster_rs_protocol::{
    Action, Document, Intent, IntentData, IntentKind, Operation, UpdateDirective, is_operator_key,
};

/// Reply used when a conversational intent carries no usable message.
pub const DEFAULT_REPLY: &str =
    "I can help with questions about employee records. What would you like to know?";

/// One unit of work for the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Store operation to execute (or to acknowledge, for `unknown`).
    Operation(Operation),
    /// Conversational answer with no store access.
    Reply { message: String },
}

/// Maps intents to operations against a default collection.
#[derive(Debug, Clone)]
pub struct IntentTranslator {
    default_collection: String,
}

impl IntentTranslator {
    pub fn new(default_collection: impl Into<String>) -> Self {
        Self {
            default_collection: default_collection.into(),
        }
    }

    /// Translate a batch. Any invalid intent fails the whole batch.
    pub fn translate(&self, intents: &[Intent]) -> Result<Vec<Step>, TranslationError> {
        intents.iter().map(|intent| self.translate_one(intent)).collect()
    }

    fn translate_one(&self, intent: &Intent) -> Result<Step, TranslationError> {
        let collection = intent
            .collection
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.default_collection);
        let filter = intent.filter.clone().unwrap_or_default();
        let operation = match &intent.kind {
            IntentKind::Read => {
                let mut operation = Operation::new(Action::Find, collection);
                operation.filter = filter;
                operation.projection = intent.projection.clone().filter(|p| !p.is_empty());
                operation
            }
            IntentKind::Aggregate => {
                let pipeline = intent
                    .pipeline
                    .clone()
                    .filter(|stages| !stages.is_empty())
                    .ok_or(TranslationError::MissingPipeline)?;
                let mut operation = Operation::new(Action::Aggregate, collection);
                operation.pipeline = pipeline;
                operation
            }
            IntentKind::Update => {
                let payload = match &intent.data {
                    Some(IntentData::One(payload)) if !payload.is_empty() => payload.clone(),
                    Some(IntentData::Many(records)) if !records.is_empty() => {
                        return Err(TranslationError::UpdateDataNotObject);
                    }
                    _ => {
                        return Err(TranslationError::MissingData {
                            kind: "update".to_string(),
                        });
                    }
                };
                if filter.is_empty() {
                    return Err(TranslationError::MissingUpdateFilter);
                }
                let mut operation = Operation::new(Action::UpdateMany, collection);
                operation.filter = filter;
                operation.update = Some(update_directive(payload)?);
                operation
            }
            IntentKind::Write => {
                let (action, data) = match &intent.data {
                    Some(data) if data.is_empty() => {
                        return Err(TranslationError::MissingData {
                            kind: "write".to_string(),
                        });
                    }
                    Some(IntentData::Many(records)) => (Action::InsertMany, records.clone()),
                    Some(IntentData::One(record)) => (Action::Create, vec![record.clone()]),
                    None => {
                        return Err(TranslationError::MissingData {
                            kind: "write".to_string(),
                        });
                    }
                };
                let mut operation = Operation::new(action, collection);
                operation.data = data;
                operation
            }
            IntentKind::Delete => {
                if filter.is_empty() {
                    return Err(TranslationError::MissingDeleteFilter);
                }
                let mut operation = Operation::new(Action::DeleteMany, collection);
                operation.filter = filter;
                operation
            }
            IntentKind::DeleteAll => return Err(TranslationError::DeleteAllRejected),
            kind if kind.is_conversational() => {
                let message = match intent.message.as_deref().map(str::trim) {
                    Some(message) if !message.is_empty() => message.to_string(),
                    _ => DEFAULT_REPLY.to_string(),
                };
                return Ok(Step::Reply { message });
            }
            other => {
                let mut operation = Operation::new(Action::Unknown, collection);
                operation.reason = Some(match &intent.message {
                    Some(message) => format!("{other} intent not processed: {message}"),
                    None => format!("{other} intent not processed"),
                });
                operation
            }
        };
        Ok(Step::Operation(operation))
    }
}

/// Operator payloads must be all operators; plain payloads become `$set`.
fn update_directive(payload: Document) -> Result<UpdateDirective, TranslationError> {
    let (operators, fields): (Vec<&String>, Vec<&String>) =
        payload.keys().partition(|key| is_operator_key(key));
    if !operators.is_empty() && !fields.is_empty() {
        return Err(TranslationError::MixedUpdate {
            operators: join_keys(&operators),
            fields: join_keys(&fields),
        });
    }
    Ok(UpdateDirective::from_payload(payload))
}

fn join_keys(keys: &[&String]) -> String {
    keys.iter()
        .map(|key| key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_REPLY, IntentTranslator, Step};
    use crate::error::TranslationError;
    use pretty_assertions::assert_eq;
    use roster_rs_protocol::{
        Action, Document, Intent, IntentData, IntentKind, UpdateDirective,
    };
    use serde_json::{Value, json};

    fn object(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    fn translator() -> IntentTranslator {
        IntentTranslator::new("employees")
    }

    fn single_operation(intent: Intent) -> roster_rs_protocol::Operation {
        match translator().translate(&[intent]).expect("translate").remove(0) {
            Step::Operation(operation) => operation,
            Step::Reply { .. } => panic!("expected an operation"),
        }
    }

    #[test]
    fn read_defaults_collection_and_keeps_filter() {
        let operation = single_operation(
            Intent::new(IntentKind::Read).with_filter(object(json!({ "department": "Sales" }))),
        );
        assert_eq!(operation.action, Action::Find);
        assert_eq!(operation.collection, "employees");
        assert_eq!(operation.filter, object(json!({ "department": "Sales" })));
    }

    #[test]
    fn relative_update_passes_through() {
        let payload = object(json!({ "$mul": { "salary_usd": 1.05 } }));
        let operation = single_operation(
            Intent::new(IntentKind::Update)
                .with_filter(object(json!({ "department": "Sales" })))
                .with_data(IntentData::One(payload.clone())),
        );
        assert_eq!(operation.update, Some(UpdateDirective::OperatorUpdate(payload)));
    }

    #[test]
    fn update_requires_data_and_filter() {
        let translator = translator();
        let no_data = Intent::new(IntentKind::Update).with_filter(object(json!({ "name": "Ada" })));
        assert_eq!(
            translator.translate(&[no_data]),
            Err(TranslationError::MissingData {
                kind: "update".to_string()
            })
        );
        let no_filter = Intent::new(IntentKind::Update)
            .with_data(IntentData::One(object(json!({ "location": "Remote" }))));
        assert_eq!(
            translator.translate(&[no_filter]),
            Err(TranslationError::MissingUpdateFilter)
        );
    }

    #[test]
    fn mixed_update_payload_is_rejected() {
        let intent = Intent::new(IntentKind::Update)
            .with_filter(object(json!({ "name": "Ada" })))
            .with_data(IntentData::One(object(
                json!({ "$inc": { "bonus_usd": 10 }, "location": "Remote" }),
            )));
        assert!(matches!(
            translator().translate(&[intent]),
            Err(TranslationError::MixedUpdate { .. })
        ));
    }

    #[test]
    fn write_picks_action_from_data_shape() {
        let single = single_operation(
            Intent::new(IntentKind::Write).with_data(IntentData::One(object(json!({ "name": "Eve" })))),
        );
        assert_eq!(single.action, Action::Create);
        assert_eq!(single.data.len(), 1);

        let batch = single_operation(Intent::new(IntentKind::Write).with_data(IntentData::Many(vec![
            object(json!({ "name": "Eve" })),
            object(json!({ "name": "Finn" })),
        ])));
        assert_eq!(batch.action, Action::InsertMany);
        assert_eq!(batch.data.len(), 2);
    }

    #[test]
    fn destructive_requests_without_filter_fail_the_batch() {
        let translator = translator();
        let batch = [
            Intent::new(IntentKind::Read),
            Intent::new(IntentKind::Delete),
        ];
        assert_eq!(
            translator.translate(&batch),
            Err(TranslationError::MissingDeleteFilter)
        );
        assert_eq!(
            translator.translate(&[Intent::new(IntentKind::DeleteAll)]),
            Err(TranslationError::DeleteAllRejected)
        );
        assert_eq!(
            translator.translate(&[Intent::new(IntentKind::Aggregate).with_pipeline(Vec::new())]),
            Err(TranslationError::MissingPipeline)
        );
    }

    #[test]
    fn conversational_and_unknown_kinds_never_fail() {
        let steps = translator()
            .translate(&[
                Intent::new(IntentKind::NonDb).with_message("Hello!"),
                Intent::new(IntentKind::Other("EXPORT".to_string())),
            ])
            .expect("translate");
        assert_eq!(
            steps[0],
            Step::Reply {
                message: "Hello!".to_string()
            }
        );
        let Step::Operation(unknown) = &steps[1] else {
            panic!("expected an operation");
        };
        assert_eq!(unknown.action, Action::Unknown);
        assert_eq!(unknown.reason.as_deref(), Some("EXPORT intent not processed"));
    }

    #[test]
    fn silent_conversational_intents_get_a_default_reply() {
        let steps = translator()
            .translate(&[
                Intent::new(IntentKind::NonDb),
                Intent::new(IntentKind::Chat).with_message("   "),
            ])
            .expect("translate");
        for step in steps {
            assert_eq!(
                step,
                Step::Reply {
                    message: DEFAULT_REPLY.to_string()
                }
            );
        }
    }
}
