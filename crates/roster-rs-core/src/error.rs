//! Error types for the core pipeline crate.

use roster_rs_config::ConfigError;
use roster_rs_protocol::Action;
use roster_rs_store::StoreError;
use thiserror::Error;

/// Reasons an intent batch cannot be turned into safe operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslationError {
    /// Aggregate intent without stages.
    #[error("an aggregation needs a non-empty pipeline")]
    MissingPipeline,
    /// Write or update intent without a payload.
    #[error("a {kind} request needs data to write")]
    MissingData { kind: String },
    /// Update intent without a filter.
    #[error("please specify which records to update; an update needs a filter")]
    MissingUpdateFilter,
    /// Delete intent without a filter.
    #[error("please specify a filter for the records to delete")]
    MissingDeleteFilter,
    /// Request to wipe a whole collection.
    #[error("deleting every record is not allowed from a conversation; use the purge command")]
    DeleteAllRejected,
    /// Update payload is a list instead of one object.
    #[error("update data must be a single object")]
    UpdateDataNotObject,
    /// Update payload mixes `$` operators and plain fields.
    #[error("update data cannot mix operators ({operators}) with plain fields ({fields})")]
    MixedUpdate { operators: String, fields: String },
}

/// Failures while running an operation against a store.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Store reported an error.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Operation rejected by the safety guard.
    #[error("unsafe operation rejected: {0}")]
    Unsafe(String),
    /// Action the executor does not run.
    #[error("unsupported action: {0}")]
    UnsupportedAction(Action),
    /// Neither the primary nor the fallback store answered.
    #[error("no record store available: {0}")]
    NoStore(String),
    /// Purge confirmation did not match the collection.
    #[error("purge of `{collection}` not confirmed; pass the collection name as confirmation")]
    PurgeNotConfirmed { collection: String },
}

/// Failures of the session context store.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors returned while assembling or driving the pipeline.
#[derive(Debug, Error)]
pub enum RosterCoreError {
    /// Config error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Store construction error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Execution error outside a command (purge).
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    /// Session context error.
    #[error("context error: {0}")]
    Context(#[from] ContextError),
    /// Language model provider could not be built.
    #[error("provider error: {0}")]
    Provider(String),
}
