//! Builds the effective `RosterConfig` from up to four JSON5 layers.
//!
//! Precedence, lowest first: system file, user file (`~/.roster`), the
//! working directory's `roster.json5`, then any runtime files passed in by
//! the caller. Every layer is shape-checked on its own before the objects
//! are deep-merged; cross-setting rules only run on the merged result.

mod discovery;
mod merge;
mod schema;


use crate::{ConfigError, MAX_FIND_LIMIT, RosterConfig, SessionProvider};
use log::{debug, info};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

#[cfg(test)]
use discovery::CONFIG_FILE_NAME;

/// Where a layer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    System,
    User,
    Cwd,
    Runtime,
}

impl ConfigLayerSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Cwd => "cwd",
            Self::Runtime => "runtime",
        }
    }
}

/// A layer that contributed to the effective config.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub config: RosterConfig,
    /// Contributing layers in merge order.
    pub layers: Vec<ConfigLayer>,
}

/// Locations searched by `RosterConfig::load_layered_with_options`. Set a
/// location to `None` to skip that layer.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    pub cwd: PathBuf,
    pub system_config_path: Option<PathBuf>,
    pub user_config_path: Option<PathBuf>,
    pub runtime_paths: Vec<PathBuf>,
}

impl LayeredConfigOptions {
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: discovery::system_config_file(),
            user_config_path: discovery::user_config_file(),
            runtime_paths: Vec::new(),
        }
    }

    /// Append a runtime file. Runtime files must exist and win over
    /// everything discovered.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }
}

impl RosterConfig {
    /// Read one file, without layering.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("reading roster config (path={})", path.display());
        Self::load_from_str(&std::fs::read_to_string(path)?)
    }

    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        finish(json5::from_str(contents)?, "config")
    }

    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let mut merged = Value::Object(Map::new());
        let mut layers = Vec::new();
        for candidate in discovery::candidates(&options)? {
            let Some(layer) = discovery::read(candidate)? else {
                continue;
            };
            debug!(
                "merging config layer (source={})",
                layer.meta.source.label()
            );
            merge::merge_json_values(&mut merged, &layer.value);
            layers.push(layer.meta);
        }
        let config = finish(merged, "effective")?;
        info!(
            "roster config ready (layers={}, store={:?}, sessions={:?})",
            layers.len(),
            config.store.provider,
            config.sessions.provider
        );
        Ok(LayeredConfig { config, layers })
    }

    /// Rules that span several settings and so cannot be checked per layer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let problem = if !(1..=MAX_FIND_LIMIT).contains(&self.executor.find_limit) {
            Some(format!(
                "executor.find_limit must be between 1 and {MAX_FIND_LIMIT}"
            ))
        } else if self.store.collection.trim().is_empty() {
            Some("store.collection must not be empty".to_string())
        } else if self.store.fallback.enabled && self.store.fallback.path.is_none() {
            Some("store.fallback.path is required when the fallback is enabled".to_string())
        } else if self.sessions.provider == SessionProvider::File && self.sessions.path.is_none() {
            Some("sessions.path is required for the file provider".to_string())
        } else if self.sessions.default_session_id.trim().is_empty() {
            Some("sessions.default_session_id must not be empty".to_string())
        } else if self.classifier.timeout_ms == 0 {
            Some("classifier.timeout_ms must be positive".to_string())
        } else {
            None
        };
        match problem {
            Some(problem) => Err(ConfigError::Invalid(problem)),
            None => Ok(()),
        }
    }
}

fn finish(value: Value, origin: &str) -> Result<RosterConfig, ConfigError> {
    schema::check(&value, origin)?;
    let config: RosterConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
