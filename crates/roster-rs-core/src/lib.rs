//! Core pipeline for Roster.
//!
//! This crate owns the schema catalog, session context, intent classifier,
//! translator, executor and the orchestrator used by the server and SDK.

pub mod catalog;
pub mod classifier;
pub mod context;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod prompt;
pub mod translator;

pub use catalog::SchemaCatalog;
/// Classifier seam and the language-model implementation.
pub use classifier::{IntentClassifier, LlmClassifier, build_llm, parse_intents};
pub use context::{ContextStore, FileContextStore, InMemoryContextStore};
pub use error::{ContextError, ExecutionError, RosterCoreError, TranslationError};
pub use executor::QueryExecutor;
pub use orchestrator::Orchestrator;
pub use translator::{DEFAULT_REPLY, IntentTranslator, Step};
