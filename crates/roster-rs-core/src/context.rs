//! Session context stores: last read/aggregate per session id.

use crate::error::ContextError;
use log::{debug, info};
use parking_lot::RwLock;
use roster_rs_protocol::SessionContext;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Per-session context storage. Entries are replaced or removed whole.
pub trait ContextStore: Send + Sync {
    /// Context of a session, `None` when unknown.
    fn get(&self, session_id: &str) -> Result<Option<SessionContext>, ContextError>;
    /// Overwrite the context of a session.
    fn set(&self, session_id: &str, context: SessionContext) -> Result<(), ContextError>;
    /// Remove the context of a session; returns whether one existed.
    fn clear(&self, session_id: &str) -> Result<bool, ContextError>;
}

/// Process-lifetime context store.
#[derive(Debug, Default)]
pub struct InMemoryContextStore {
    entries: RwLock<HashMap<String, SessionContext>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContextStore for InMemoryContextStore {
    fn get(&self, session_id: &str) -> Result<Option<SessionContext>, ContextError> {
        Ok(self.entries.read().get(session_id).cloned())
    }

    fn set(&self, session_id: &str, context: SessionContext) -> Result<(), ContextError> {
        self.entries.write().insert(session_id.to_string(), context);
        Ok(())
    }

    fn clear(&self, session_id: &str) -> Result<bool, ContextError> {
        Ok(self.entries.write().remove(session_id).is_some())
    }
}

/// Context store persisting one JSON document per session.
#[derive(Debug, Clone)]
pub struct FileContextStore {
    root: PathBuf,
}

impl FileContextStore {
    /// Create a store under `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ContextError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("initialized file context store (root={})", root.display());
        Ok(Self { root })
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", file_stem(session_id)))
    }
}

/// Encode a session id as a safe file stem: alphanumerics, `-` and `_` pass
/// through, everything else becomes `~XX` per byte.
fn file_stem(session_id: &str) -> String {
    let mut stem = String::with_capacity(session_id.len());
    for byte in session_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("~{byte:02X}"));
        }
    }
    stem
}

impl ContextStore for FileContextStore {
    fn get(&self, session_id: &str) -> Result<Option<SessionContext>, ContextError> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn set(&self, session_id: &str, context: SessionContext) -> Result<(), ContextError> {
        let path = self.session_path(session_id);
        let temp_path = path.with_extension("json.tmp");
        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&temp_path)?;
            file.write_all(serde_json::to_string(&context)?.as_bytes())?;
        }
        fs::rename(temp_path, path)?;
        debug!("stored session context (session_id={session_id})");
        Ok(())
    }

    fn clear(&self, session_id: &str) -> Result<bool, ContextError> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        debug!("cleared session context (session_id={session_id})");
        Ok(true)
    }
}
