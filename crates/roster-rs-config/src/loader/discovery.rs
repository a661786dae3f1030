//! Finding and reading the files that make up a layered config.

use super::{ConfigLayer, ConfigLayerSource, LayeredConfigOptions, schema};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub(super) const CONFIG_FILE_NAME: &str = "roster.json5";
const USER_CONFIG_DIR: &str = ".roster";

#[cfg(unix)]
const SYSTEM_CONFIG_FILE: Option<&str> = Some("/etc/roster/roster.json5");
#[cfg(windows)]
const SYSTEM_CONFIG_FILE: Option<&str> = Some("C:\\ProgramData\\roster\\roster.json5");
#[cfg(not(any(unix, windows)))]
const SYSTEM_CONFIG_FILE: Option<&str> = None;

pub(super) fn system_config_file() -> Option<PathBuf> {
    SYSTEM_CONFIG_FILE.map(PathBuf::from)
}

/// `~/.roster/roster.json5`, when a home directory exists.
pub(super) fn user_config_file() -> Option<PathBuf> {
    let dirs = UserDirs::new()?;
    Some(dirs.home_dir().join(USER_CONFIG_DIR).join(CONFIG_FILE_NAME))
}

/// A file that may contribute a layer. Runtime files must exist; the
/// others are skipped when absent.
#[derive(Debug)]
pub(super) struct Candidate {
    pub source: ConfigLayerSource,
    pub path: PathBuf,
    pub required: bool,
}

/// A parsed layer ready to be merged.
#[derive(Debug)]
pub(super) struct Layer {
    pub meta: ConfigLayer,
    pub value: Value,
}

/// Candidates in merge order (lowest precedence first). A file reachable
/// through two sources, such as a cwd that is also the user config dir,
/// only counts once.
pub(super) fn candidates(options: &LayeredConfigOptions) -> Result<Vec<Candidate>, ConfigError> {
    let cwd = match options.cwd.canonicalize() {
        Ok(cwd) => cwd,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => options.cwd.clone(),
        Err(err) => return Err(err.into()),
    };
    let discovered = [
        (ConfigLayerSource::System, options.system_config_path.clone()),
        (ConfigLayerSource::User, options.user_config_path.clone()),
        (ConfigLayerSource::Cwd, Some(cwd.join(CONFIG_FILE_NAME))),
    ]
    .into_iter()
    .filter_map(|(source, path)| {
        path.map(|path| Candidate {
            source,
            path,
            required: false,
        })
    });
    let runtime = options.runtime_paths.iter().map(|path| Candidate {
        source: ConfigLayerSource::Runtime,
        path: path.clone(),
        required: true,
    });

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for candidate in discovered.chain(runtime) {
        let identity = candidate
            .path
            .canonicalize()
            .unwrap_or_else(|_| candidate.path.clone());
        if !candidate.required && !seen.insert(identity) {
            debug!(
                "config file already listed (source={}, path={})",
                candidate.source.label(),
                candidate.path.display()
            );
            continue;
        }
        out.push(candidate);
    }
    Ok(out)
}

/// Parse one candidate. `Ok(None)` means an optional file was absent.
pub(super) fn read(candidate: Candidate) -> Result<Option<Layer>, ConfigError> {
    let contents = match fs::read_to_string(&candidate.path) {
        Ok(contents) => contents,
        Err(err) if !candidate.required && err.kind() == std::io::ErrorKind::NotFound => {
            debug!(
                "no config file (source={}, path={})",
                candidate.source.label(),
                candidate.path.display()
            );
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };
    let value: Value = json5::from_str(&contents)?;
    let origin = format!(
        "{}({})",
        candidate.source.label(),
        candidate.path.display()
    );
    schema::check(&value, &origin)?;
    Ok(Some(Layer {
        meta: ConfigLayer {
            source: candidate.source,
            path: Some(candidate.path),
        },
        value,
    }))
}
