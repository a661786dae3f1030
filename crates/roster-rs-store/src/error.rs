//! Error types for record store operations.

/// Errors returned by record stores and the query engines.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// CSV read/write error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// Store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Collection name is not a plain identifier.
    #[error("invalid collection name: {0}")]
    InvalidCollection(String),
    /// Filter is malformed.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    /// Query or update operator the engine does not implement.
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),
    /// Pipeline stage the engine does not implement.
    #[error("unsupported pipeline stage: {0}")]
    UnsupportedStage(String),
    /// Pipeline is malformed.
    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),
    /// Update document is malformed or cannot apply to a record.
    #[error("invalid update: {0}")]
    InvalidUpdate(String),
    /// No free identifier was found within the retry budget.
    #[error("could not generate a unique identifier after {0} attempts")]
    IdExhausted(usize),
}
