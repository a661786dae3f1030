use pretty_assertions::assert_eq;
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use roster_rs_config::RosterConfig;
use roster_rs_core::{LlmClassifier, Orchestrator, QueryExecutor};
use roster_rs_store::DocumentStore;
use roster_rs_test_utils::{ScriptedLLM, sample_employees};
use serde_json::{Value, json};
use std::sync::Arc;

async fn client(responses: &[&str]) -> Client {
    let config = RosterConfig::default();
    let llm = Arc::new(ScriptedLLM::new(responses.iter().copied()));
    let classifier = Arc::new(LlmClassifier::from_config(llm, &config.classifier));
    let store = DocumentStore::in_memory()
        .with_records("employees", sample_employees())
        .expect("seed");
    let executor = Arc::new(QueryExecutor::new(Arc::new(store)));
    let server = config.server.clone();
    let orchestrator =
        Orchestrator::new(config, classifier, Some(executor), None).expect("orchestrator");
    Client::tracked(roster_rs_server::build(Arc::new(orchestrator), &server))
        .await
        .expect("client")
}

async fn post_command(client: &Client, body: Value) -> (Status, Value) {
    let response = client
        .post("/api/command")
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch()
        .await;
    let status = response.status();
    let body = response.into_json::<Value>().await.expect("json body");
    (status, body)
}

#[tokio::test]
async fn health_reports_ok() {
    let client = client(&[]).await;
    let response = client.get("/api/health").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let body = response.into_json::<Value>().await.expect("json body");
    assert_eq!(body["status"], json!("ok"));
}

#[tokio::test]
async fn command_success_and_session_context_routes() {
    let client = client(&[r#"[{"kind": "READ", "filter": {"department": "HR"}}]"#]).await;

    let (status, body) = post_command(
        &client,
        json!({ "prompt": "who works in HR?", "sessionId": "web-1" }),
    )
    .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["status"], json!("Success"));
    assert_eq!(body["response"], json!("Found 1 matching records"));
    assert_eq!(body["meta"]["sessionId"], json!("web-1"));
    assert_eq!(body["meta"]["originalPrompt"], json!("who works in HR?"));

    let context = client.get("/api/sessions/web-1/context").dispatch().await;
    assert_eq!(context.status(), Status::Ok);
    let context = context.into_json::<Value>().await.expect("json body");
    assert_eq!(context["lastFilterOrPipeline"], json!({ "department": "HR" }));

    let cleared = client.delete("/api/sessions/web-1/context").dispatch().await;
    assert_eq!(
        cleared.into_json::<Value>().await.expect("json body"),
        json!({ "cleared": true })
    );
    let missing = client.get("/api/sessions/web-1/context").dispatch().await;
    assert_eq!(missing.status(), Status::NotFound);
}

#[tokio::test]
async fn empty_command_is_bad_request() {
    let client = client(&[]).await;
    let (status, body) = post_command(&client, json!({})).await;
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["error"]["kind"], json!("input"));
    assert_eq!(body["meta"]["sessionId"], json!("default"));
}

#[tokio::test]
async fn non_utf8_attachment_is_bad_request() {
    let client = client(&[]).await;
    let (status, body) = post_command(
        &client,
        json!({ "prompt": "import", "file": { "name": "photo.png", "content": "//79AA==" } }),
    )
    .await;
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["status"], json!("Error"));
}

#[tokio::test]
async fn translation_errors_are_unprocessable() {
    let client = client(&[r#"[{"kind": "DELETE_ALL"}]"#]).await;
    let (status, body) = post_command(&client, json!({ "prompt": "wipe everything" })).await;
    assert_eq!(status, Status::UnprocessableEntity);
    assert_eq!(body["error"]["kind"], json!("translation"));
}

#[tokio::test]
async fn clarification_is_ok_with_suggestions() {
    let client = client(&[r#"[{"kind": "AMBIGUOUS", "message": "Which team?", "suggestions": ["Sales", "HR"]}]"#]).await;
    let (status, body) = post_command(&client, json!({ "prompt": "show the team" })).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["status"], json!("Clarification Needed"));
    assert_eq!(body["details"]["suggestions"], json!(["Sales", "HR"]));
}
