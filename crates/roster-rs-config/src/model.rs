//! Configuration schema for Roster.

use serde::{Deserialize, Serialize};

/// Hard ceiling on records returned by a single find.
pub const MAX_FIND_LIMIT: usize = 200;

/// Root config for the Roster pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RosterConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl RosterConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> RosterConfigBuilder {
        RosterConfigBuilder::new()
    }
}

/// Builder for assembling a `RosterConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct RosterConfigBuilder {
    config: RosterConfig,
}

impl RosterConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: RosterConfig::default(),
        }
    }

    /// Replace the classifier configuration.
    pub fn classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.config.classifier = classifier;
        self
    }

    /// Replace the record store configuration.
    pub fn store(mut self, store: StoreConfig) -> Self {
        self.config.store = store;
        self
    }

    /// Replace the executor configuration.
    pub fn executor(mut self, executor: ExecutorConfig) -> Self {
        self.config.executor = executor;
        self
    }

    /// Replace the session configuration.
    pub fn sessions(mut self, sessions: SessionsConfig) -> Self {
        self.config.sessions = sessions;
        self
    }

    /// Replace the HTTP server configuration.
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.config.server = server;
        self
    }

    /// Finalize and return the built `RosterConfig`.
    pub fn build(self) -> RosterConfig {
        self.config
    }
}

/// Language model used to classify prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_provider")]
    pub provider: String,
    #[serde(default = "default_classifier_model")]
    pub model: String,
    /// Name of the environment variable holding the provider API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_classifier_timeout_ms")]
    pub timeout_ms: u64,
    /// Operator-supplied text appended to the classifier directive.
    #[serde(default)]
    pub append_instructions: Option<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: default_classifier_provider(),
            model: default_classifier_model(),
            api_key_env: default_api_key_env(),
            timeout_ms: default_classifier_timeout_ms(),
            append_instructions: None,
        }
    }
}

fn default_classifier_provider() -> String {
    "openai".to_string()
}

fn default_classifier_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_classifier_timeout_ms() -> u64 {
    30_000
}

/// Record store backend selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    /// JSONL-backed document collections.
    #[default]
    Document,
    /// One CSV file per collection.
    Csv,
}

/// Record store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub provider: StoreProvider,
    /// Root directory for collection files; memory-only when absent.
    #[serde(default)]
    pub path: Option<String>,
    /// Collection used when an intent names none.
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub fallback: FallbackConfig,
    /// Retry generated identifiers that collide with existing records.
    #[serde(default = "default_true")]
    pub id_collision_check: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: StoreProvider::default(),
            path: None,
            collection: default_collection(),
            fallback: FallbackConfig::default(),
            id_collision_check: true,
        }
    }
}

fn default_collection() -> String {
    "employees".to_string()
}

fn default_true() -> bool {
    true
}

/// Flat-file store used when the primary store is unreachable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FallbackConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Directory holding `<collection>.csv` files.
    #[serde(default)]
    pub path: Option<String>,
}

/// Query executor limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_find_limit")]
    pub find_limit: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            find_limit: default_find_limit(),
        }
    }
}

fn default_find_limit() -> usize {
    MAX_FIND_LIMIT
}

/// Session context backend selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionProvider {
    #[default]
    Memory,
    File,
}

/// Session context settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default)]
    pub provider: SessionProvider,
    /// Directory for file-backed session context.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_session_id")]
    pub default_session_id: String,
    /// Run commands of the same session one at a time.
    #[serde(default = "default_true")]
    pub serialize_commands: bool,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            provider: SessionProvider::default(),
            path: None,
            default_session_id: default_session_id(),
            serialize_commands: true,
        }
    }
}

fn default_session_id() -> String {
    "default".to_string()
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}
