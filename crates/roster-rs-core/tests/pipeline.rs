use pretty_assertions::assert_eq;
use roster_rs_config::{ClassifierConfig, RosterConfig};
use roster_rs_core::{DEFAULT_REPLY, LlmClassifier, Orchestrator, QueryExecutor};
use roster_rs_protocol::{Action, CommandRequest, CommandResponse, ErrorKind, ExecutionResult};
use roster_rs_store::{CsvStore, DocumentStore, RecordStore};
use roster_rs_test_utils::{
    FailingLLM, FixedLLM, ScriptedLLM, SlowLLM, UnavailableStore, doc, sample_employees,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn seeded_store() -> Arc<DocumentStore> {
    Arc::new(
        DocumentStore::in_memory()
            .with_records("employees", sample_employees())
            .expect("seed"),
    )
}

fn orchestrator_with(
    llm: Arc<dyn autoagents_llm::LLMProvider>,
    executor: QueryExecutor,
    classifier_config: ClassifierConfig,
) -> Orchestrator {
    let config = RosterConfig::builder()
        .classifier(classifier_config.clone())
        .build();
    let classifier = Arc::new(LlmClassifier::from_config(llm, &classifier_config));
    Orchestrator::new(config, classifier, Some(Arc::new(executor)), None).expect("orchestrator")
}

fn orchestrator(llm: ScriptedLLM, store: Arc<DocumentStore>) -> Orchestrator {
    orchestrator_with(
        Arc::new(llm),
        QueryExecutor::new(store),
        ClassifierConfig::default(),
    )
}

fn records(response: &CommandResponse) -> Vec<ExecutionResult> {
    match response {
        CommandResponse::Success { results, .. } => {
            results.iter().map(|report| report.result.clone()).collect()
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn read_returns_only_matching_records_and_sets_context() {
    let llm = ScriptedLLM::new([r#"[{"kind": "READ", "filter": {"department": "Sales", "performance_score": {"$gt": 4}}}]"#]);
    let orchestrator = orchestrator(llm, seeded_store());

    let response = orchestrator
        .handle(CommandRequest::prompt("Find everyone in Sales with a rating over 4").in_session("s1"))
        .await;

    assert_eq!(response.text(), "Found 1 matching records");
    let ExecutionResult::Records { records, truncated, .. } = &records(&response)[0] else {
        panic!("expected records");
    };
    assert!(!truncated);
    assert_eq!(records[0]["name"], json!("Ada Park"));
    assert_eq!(response.meta().session_id, "s1");

    let context = orchestrator
        .session_context("s1")
        .expect("context")
        .expect("context set");
    assert_eq!(context.last_action, Action::Find);
    assert_eq!(context.result_count, 1);
    assert_eq!(
        context.last_filter_or_pipeline,
        json!({ "department": "Sales", "performance_score": { "$gt": 4 } })
    );
}

#[tokio::test]
async fn update_by_name_clears_session_context() {
    let llm = ScriptedLLM::new([
        r#"[{"kind": "READ", "filter": {"name": "Ada Park"}}]"#,
        r#"[{"kind": "UPDATE", "query": {"name": "Ada Park"}, "data": {"salary_usd": 80000}}]"#,
    ]);
    let store = seeded_store();
    let orchestrator = orchestrator(llm, store.clone());

    orchestrator.handle(CommandRequest::prompt("Show Ada Park")).await;
    assert!(orchestrator.session_context("default").expect("context").is_some());

    let response = orchestrator
        .handle(CommandRequest::prompt("Update Ada Park's salary to 80000"))
        .await;
    assert_eq!(
        records(&response),
        vec![ExecutionResult::Updated {
            matched: 1,
            modified: 1
        }]
    );
    let CommandResponse::Success { results, .. } = &response else {
        panic!("expected success");
    };
    assert_eq!(results[0].update, Some(doc(json!({ "$set": { "salary_usd": 80000 } }))));
    assert_eq!(orchestrator.session_context("default").expect("context"), None);

    let page = store
        .find("employees", &doc(json!({ "name": "Ada Park" })), None, 10)
        .await
        .expect("find");
    assert_eq!(page.records[0]["salary_usd"], json!(80000));
}

#[tokio::test]
async fn delete_all_is_rejected_without_touching_records() {
    let llm = ScriptedLLM::new([r#"[{"kind": "DELETE_ALL"}]"#]);
    let store = seeded_store();
    let orchestrator = orchestrator(llm, store.clone());

    let response = orchestrator
        .handle(CommandRequest::prompt("Wipe the entire database"))
        .await;

    assert_eq!(response.error_kind(), Some(ErrorKind::Translation));
    assert_eq!(store.ids("employees").await.expect("ids").len(), 5);
}

#[tokio::test]
async fn delete_without_filter_is_rejected() {
    let llm = ScriptedLLM::new([r#"[{"kind": "DELETE", "filter": {}}]"#]);
    let store = seeded_store();
    let orchestrator = orchestrator(llm, store.clone());

    let response = orchestrator.handle(CommandRequest::prompt("delete them")).await;

    assert_eq!(response.error_kind(), Some(ErrorKind::Translation));
    assert_eq!(response.text(), "please specify a filter for the records to delete");
    assert_eq!(store.ids("employees").await.expect("ids").len(), 5);
}

#[tokio::test]
async fn follow_up_sees_previous_context() {
    let llm = ScriptedLLM::new([
        r#"[{"kind": "READ", "filter": {"department": "Sales"}}]"#,
        r#"```json
[{"kind": "UPDATE", "filter": {"department": "Sales"}, "data": {"$mul": {"salary_usd": 1.1}}}]
```"#,
    ]);
    let probe = llm.clone();
    let orchestrator = orchestrator(llm, seeded_store());

    let first = orchestrator.handle(CommandRequest::prompt("Find Sales reps")).await;
    assert_eq!(first.text(), "Found 2 matching records");

    let second = orchestrator
        .handle(CommandRequest::prompt("increase their salary by 10%"))
        .await;
    let seen = probe.last_user_message().expect("user message");
    assert!(
        seen.contains(r#""lastFilterOrPipeline":{"department":"Sales"}"#),
        "context missing from {seen}"
    );
    assert!(seen.ends_with("Request: increase their salary by 10%"));
    assert_eq!(
        records(&second),
        vec![ExecutionResult::Updated {
            matched: 2,
            modified: 2
        }]
    );
    assert_eq!(orchestrator.session_context("default").expect("context"), None);
}

#[tokio::test]
async fn ambiguity_short_circuits_without_side_effects() {
    let llm = ScriptedLLM::new([
        r#"[{"kind": "READ", "filter": {"department": "HR"}}]"#,
        r#"[{"kind": "AMBIGUOUS", "message": "Which employees?", "suggestions": ["All of Sales", "Only managers"]}, {"kind": "DELETE", "filter": {"department": "HR"}}]"#,
    ]);
    let store = seeded_store();
    let orchestrator = orchestrator(llm, store.clone());
    orchestrator.handle(CommandRequest::prompt("Show HR")).await;
    let before = orchestrator.session_context("default").expect("context");

    let response = orchestrator.handle(CommandRequest::prompt("change them")).await;

    let CommandResponse::Clarification { message, details, .. } = &response else {
        panic!("expected clarification, got {response:?}");
    };
    assert_eq!(message, "Which employees?");
    assert_eq!(details.suggestions, vec!["All of Sales", "Only managers"]);
    assert_eq!(orchestrator.session_context("default").expect("context"), before);
    assert_eq!(store.ids("employees").await.expect("ids").len(), 5);
    assert_eq!(
        response.to_value()["status"],
        json!("Clarification Needed")
    );
}

#[tokio::test]
async fn batches_mix_replies_writes_and_unknown_kinds() {
    let llm = ScriptedLLM::new([r#"[
        {"kind": "WRITE", "data": [{"name": "Finn Olsen", "department": "HR"}, {"name": "Gia Rossi", "department": "HR"}]},
        {"kind": "NON_DB", "message": "Happy to help."},
        {"kind": "EXPORT", "message": "to csv"}
    ]"#]);
    let store = seeded_store();
    let orchestrator = orchestrator(llm, store.clone());

    let response = orchestrator
        .handle(CommandRequest::prompt("add Finn and Gia to HR, thanks! and export it"))
        .await;

    assert_eq!(response.text(), "Inserted 2 record(s).");
    let results = records(&response);
    let ExecutionResult::Inserted { count, records } = &results[0] else {
        panic!("expected inserted records");
    };
    assert_eq!(*count, 2);
    let ids: Vec<&str> = records
        .iter()
        .filter_map(|record| record["employee_id"].as_str())
        .collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    for id in ids {
        assert!(id.len() == 9 && id.starts_with("EMP") && id[3..].chars().all(|c| c.is_ascii_digit()));
    }
    assert_eq!(
        results[1],
        ExecutionResult::Chat {
            message: "Happy to help.".to_string()
        }
    );
    assert_eq!(
        results[2],
        ExecutionResult::Processed {
            reason: "EXPORT intent not processed: to csv".to_string()
        }
    );
    assert_eq!(store.ids("employees").await.expect("ids").len(), 7);
}

#[tokio::test]
async fn aggregate_result_is_carried_into_context() {
    let llm = ScriptedLLM::new([r#"[{"kind": "AGGREGATE", "pipeline": [
        {"$group": {"_id": "$department", "headcount": {"$sum": 1}}},
        {"$sort": {"headcount": -1, "_id": 1}}
    ]}]"#]);
    let orchestrator = orchestrator(llm, seeded_store());

    let response = orchestrator
        .handle(CommandRequest::prompt("headcount per department"))
        .await;

    assert_eq!(response.text(), "Found 3 matching records");
    let context = orchestrator
        .session_context("default")
        .expect("context")
        .expect("context set");
    assert_eq!(context.last_action, Action::Aggregate);
    assert!(context.last_filter_or_pipeline.is_array());
}

#[tokio::test]
async fn attached_file_reaches_the_classifier() {
    let llm = ScriptedLLM::new([r#"[{"kind": "CHAT", "message": "Noted."}]"#]);
    let probe = llm.clone();
    let orchestrator = orchestrator(llm, seeded_store());

    let response = orchestrator
        .handle(CommandRequest::default().with_file("hires.csv", "name\nHana"))
        .await;

    assert!(response.is_success());
    assert_eq!(response.meta().original_prompt, None);
    let seen = probe.last_user_message().expect("user message");
    assert!(seen.contains("--- Attached file: hires.csv ---\nname\nHana\n"));
}

#[tokio::test]
async fn empty_command_is_an_input_error() {
    let llm = ScriptedLLM::new(Vec::<String>::new());
    let probe = llm.clone();
    let orchestrator = orchestrator(llm, seeded_store());

    let response = orchestrator.handle(CommandRequest::prompt("   ")).await;

    assert_eq!(response.error_kind(), Some(ErrorKind::Input));
    assert_eq!(probe.calls(), 0);
}

#[tokio::test]
async fn malformed_model_output_is_a_classification_error() {
    let llm = ScriptedLLM::new(["I think you want the Sales team."]);
    let orchestrator = orchestrator(llm, seeded_store());

    let response = orchestrator.handle(CommandRequest::prompt("sales?")).await;

    assert_eq!(response.error_kind(), Some(ErrorKind::Classification));
}

#[tokio::test]
async fn provider_failure_is_a_classification_error() {
    let orchestrator = orchestrator_with(
        Arc::new(FailingLLM::new("quota exceeded")),
        QueryExecutor::new(seeded_store()),
        ClassifierConfig::default(),
    );

    let response = orchestrator.handle(CommandRequest::prompt("list staff")).await;

    assert_eq!(response.error_kind(), Some(ErrorKind::Classification));
    assert!(response.text().contains("quota exceeded"));
}

#[tokio::test]
async fn slow_provider_times_out() {
    let config = ClassifierConfig {
        timeout_ms: 20,
        ..ClassifierConfig::default()
    };
    let orchestrator = orchestrator_with(
        Arc::new(SlowLLM::new(Duration::from_millis(500), r#"[{"kind": "READ"}]"#)),
        QueryExecutor::new(seeded_store()),
        config,
    );

    let response = orchestrator.handle(CommandRequest::prompt("list staff")).await;

    assert_eq!(response.error_kind(), Some(ErrorKind::Classification));
    assert_eq!(response.text(), "classifier timed out");
}

#[tokio::test]
async fn fallback_store_serves_when_primary_is_down() {
    let temp = tempdir().expect("tempdir");
    let fallback = Arc::new(CsvStore::new(temp.path()));
    fallback
        .insert_many("employees", sample_employees())
        .await
        .expect("seed");
    let llm = ScriptedLLM::new([r#"[{"kind": "READ", "filter": {"department": "engineering"}}]"#]);
    let executor = QueryExecutor::new(Arc::new(UnavailableStore)).with_fallback(fallback);
    let orchestrator = orchestrator_with(Arc::new(llm), executor, ClassifierConfig::default());

    let response = orchestrator.handle(CommandRequest::prompt("engineers")).await;

    assert_eq!(response.text(), "Found 2 matching records");
}

#[tokio::test]
async fn store_outage_without_fallback_is_an_execution_error() {
    let llm = ScriptedLLM::new([r#"[{"kind": "READ"}]"#]);
    let orchestrator = orchestrator_with(
        Arc::new(llm),
        QueryExecutor::new(Arc::new(UnavailableStore)),
        ClassifierConfig::default(),
    );

    let response = orchestrator.handle(CommandRequest::prompt("everyone")).await;

    assert_eq!(response.error_kind(), Some(ErrorKind::Execution));
    assert_eq!(orchestrator.session_context("default").expect("context"), None);
}

#[tokio::test]
async fn purge_is_only_reachable_directly() {
    let store = seeded_store();
    let orchestrator = orchestrator(ScriptedLLM::new(Vec::<String>::new()), store.clone());

    assert!(orchestrator.purge("employees", "staff").await.is_err());
    assert_eq!(orchestrator.purge("employees", "employees").await.expect("purge"), 5);
    assert!(store.ids("employees").await.expect("ids").is_empty());
}

#[tokio::test]
async fn non_db_without_message_still_answers() {
    let orchestrator = orchestrator_with(
        Arc::new(FixedLLM::new(r#"[{"kind": "NON_DB"}]"#)),
        QueryExecutor::new(seeded_store()),
        ClassifierConfig::default(),
    );

    let response = orchestrator.handle(CommandRequest::prompt("what's the weather?")).await;

    assert!(response.is_success());
    assert_eq!(response.text(), DEFAULT_REPLY);
    assert_eq!(
        records(&response),
        vec![ExecutionResult::Chat {
            message: DEFAULT_REPLY.to_string()
        }]
    );
}

#[tokio::test]
async fn find_is_capped_at_two_hundred_records() {
    let many: Vec<_> = (0..250)
        .map(|index| {
            doc(json!({
                "employee_id": format!("EMP{:06}", 200_000 + index),
                "name": format!("Staff {index}"),
                "department": "Operations"
            }))
        })
        .collect();
    let store = Arc::new(
        DocumentStore::in_memory()
            .with_records("employees", many)
            .expect("seed"),
    );
    let executor = QueryExecutor::new(store).with_find_limit(500);
    assert_eq!(executor.find_limit(), 200);
    let orchestrator = orchestrator_with(
        Arc::new(ScriptedLLM::new([r#"[{"kind": "READ", "filter": {"department": "Operations"}}]"#])),
        executor,
        ClassifierConfig::default(),
    );

    let response = orchestrator.handle(CommandRequest::prompt("list operations staff")).await;

    let ExecutionResult::Records { count, truncated, records } = &records(&response)[0] else {
        panic!("expected records");
    };
    assert_eq!((*count, *truncated, records.len()), (200, true, 200));
    assert_eq!(response.text(), "Found 200 matching records");
}

#[tokio::test]
async fn failed_operation_keeps_earlier_writes_and_stops_the_batch() {
    let llm = ScriptedLLM::new([r#"[
        {"kind": "WRITE", "data": {"name": "Eve Stone", "department": "Ops"}},
        {"kind": "UPDATE", "filter": {"name": "Eve Stone"}, "data": {"$inc": {"name": 1}}},
        {"kind": "DELETE", "filter": {"department": "HR"}}
    ]"#]);
    let store = seeded_store();
    let orchestrator = orchestrator(llm, store.clone());

    let response = orchestrator
        .handle(CommandRequest::prompt("add Eve, bump her name, drop HR"))
        .await;

    assert_eq!(response.error_kind(), Some(ErrorKind::Execution));
    let eve = store
        .find("employees", &doc(json!({ "name": "Eve Stone" })), None, 10)
        .await
        .expect("find");
    assert_eq!(eve.records.len(), 1);
    assert_eq!(eve.records[0]["name"], json!("Eve Stone"));
    let hr = store
        .find("employees", &doc(json!({ "department": "HR" })), None, 10)
        .await
        .expect("find");
    assert_eq!(hr.records.len(), 1);
    assert_eq!(store.ids("employees").await.expect("ids").len(), 6);
}
