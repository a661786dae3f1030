//! Wire and domain types shared by the Roster crates: intents, operations,
//! execution results, session context and the command envelope.

mod command;
mod context;
mod intent;
mod operation;

pub use command::{
    Attachment, ClarificationDetails, CommandMeta, CommandRequest, CommandResponse, ErrorBody,
    ErrorKind, StepReport,
};
pub use context::SessionContext;
pub use intent::{Intent, IntentData, IntentKind};
pub use operation::{Action, ExecutionResult, Operation, UpdateDirective};

use serde_json::{Map, Value};

/// A single record or JSON object as exchanged with the record store.
pub type Document = Map<String, Value>;

/// Session identifier carried by commands.
pub type SessionKey = String;

/// Return true when a key is an operator marker (`$set`, `$gt`, ...).
pub fn is_operator_key(key: &str) -> bool {
    key.starts_with('$')
}
