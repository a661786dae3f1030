use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, error, warn};
use rocket::http::Status;
use rocket::serde::json::{Error as JsonError, Json};
use rocket::{Route, State, delete, get, post, routes};
use roster_rs_core::Orchestrator;
use roster_rs_protocol::{
    Attachment, CommandMeta, CommandRequest, CommandResponse, ErrorBody, ErrorKind,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

/// File attached to an inbound command, base64 encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUpload {
    pub name: String,
    pub content: String,
}

/// JSON body of `POST /api/command`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandBody {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub file: Option<FileUpload>,
}

impl CommandBody {
    /// Decode the attachment to UTF-8 text.
    fn into_request(self) -> Result<CommandRequest, String> {
        let file = match self.file {
            Some(upload) => {
                let bytes = STANDARD
                    .decode(upload.content.trim())
                    .map_err(|err| format!("attached file is not valid base64: {err}"))?;
                let content = String::from_utf8(bytes)
                    .map_err(|_| "attached file must be UTF-8 text".to_string())?;
                Some(Attachment {
                    name: upload.name,
                    content,
                })
            }
            None => None,
        };
        Ok(CommandRequest {
            prompt: self.prompt,
            session_id: self.session_id,
            file,
        })
    }
}

/// HTTP status for a command response.
pub fn status_for(response: &CommandResponse) -> Status {
    match response.error_kind() {
        None => Status::Ok,
        Some(ErrorKind::Input) => Status::BadRequest,
        Some(ErrorKind::Classification | ErrorKind::Translation) => Status::UnprocessableEntity,
        Some(ErrorKind::Execution | ErrorKind::Internal) => Status::InternalServerError,
    }
}

pub(crate) fn routes() -> Vec<Route> {
    routes![command, health, get_context, delete_context]
}

/// POST /api/command
#[post("/command", data = "<body>")]
async fn command(
    orchestrator: &State<Arc<Orchestrator>>,
    body: Result<Json<CommandBody>, JsonError<'_>>,
) -> (Status, Json<CommandResponse>) {
    let body = match body {
        Ok(body) => body.into_inner(),
        Err(err) => {
            warn!("rejected command body (error={err})");
            return input_error(orchestrator, None, format!("invalid request body: {err}"));
        }
    };
    let session_id = body.session_id.clone();
    let request = match body.into_request() {
        Ok(request) => request,
        Err(message) => {
            warn!("rejected attachment (error={message})");
            return input_error(orchestrator, session_id, message);
        }
    };
    let response = orchestrator.handle(request).await;
    (status_for(&response), Json(response))
}

fn input_error(
    orchestrator: &Orchestrator,
    session_id: Option<String>,
    message: String,
) -> (Status, Json<CommandResponse>) {
    let response = CommandResponse::Error {
        error: ErrorBody {
            kind: ErrorKind::Input,
            message,
        },
        meta: CommandMeta {
            request_id: Uuid::new_v4(),
            session_id: session_id.unwrap_or_else(|| orchestrator.default_session_id().to_string()),
            original_prompt: None,
            duration_ms: 0,
        },
    };
    (Status::BadRequest, Json(response))
}

/// GET /api/health
#[get("/health")]
fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// GET /api/sessions/<id>/context
#[get("/sessions/<id>/context")]
fn get_context(orchestrator: &State<Arc<Orchestrator>>, id: &str) -> (Status, Json<Value>) {
    match orchestrator.session_context(id) {
        Ok(Some(context)) => (
            Status::Ok,
            Json(serde_json::to_value(context).unwrap_or(Value::Null)),
        ),
        Ok(None) => {
            debug!("no session context (session_id={id})");
            (
                Status::NotFound,
                Json(json!({ "error": format!("no context for session {id}") })),
            )
        }
        Err(err) => {
            error!("failed to read session context (session_id={id}, error={err})");
            (
                Status::InternalServerError,
                Json(json!({ "error": err.to_string() })),
            )
        }
    }
}

/// DELETE /api/sessions/<id>/context
#[delete("/sessions/<id>/context")]
fn delete_context(orchestrator: &State<Arc<Orchestrator>>, id: &str) -> (Status, Json<Value>) {
    match orchestrator.clear_session_context(id) {
        Ok(cleared) => (Status::Ok, Json(json!({ "cleared": cleared }))),
        Err(err) => {
            error!("failed to clear session context (session_id={id}, error={err})");
            (
                Status::InternalServerError,
                Json(json!({ "error": err.to_string() })),
            )
        }
    }
}
