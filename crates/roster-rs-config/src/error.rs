use thiserror::Error;

/// Anything that stops a `RosterConfig` from being produced.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file could not be read: {0}")]
    ReadFailed(#[from] std::io::Error),
    #[error("config file is not valid JSON5: {0}")]
    ParseFailed(#[from] json5::Error),
    #[error("config does not match the Roster settings model: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// One setting has the wrong shape. `path` is `<layer>:<dotted.key>`.
    #[error("{path}: {message}")]
    InvalidField { path: String, message: String },
    /// The merged settings contradict each other.
    #[error("invalid config: {0}")]
    Invalid(String),
}
