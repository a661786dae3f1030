//! Session plumbing: the per-session command gate and context store wiring.

use crate::context::{ContextStore, FileContextStore, InMemoryContextStore};
use crate::error::RosterCoreError;
use log::{debug, info};
use parking_lot::Mutex;
use roster_rs_config::{ConfigError, SessionProvider, SessionsConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Keyed async mutex serializing commands that share a session id.
#[derive(Default)]
pub(crate) struct SessionGate {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionGate {
    /// Wait for exclusive use of a session; released when the guard drops.
    pub(crate) async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            // Forget sessions nobody is waiting on.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Build the context store selected in config.
pub(crate) fn build_context_store(
    config: &SessionsConfig,
) -> Result<Arc<dyn ContextStore>, RosterCoreError> {
    match config.provider {
        SessionProvider::Memory => {
            info!("initializing session context store (provider=memory)");
            Ok(Arc::new(InMemoryContextStore::new()))
        }
        SessionProvider::File => {
            let path = config.path.as_deref().ok_or_else(|| {
                ConfigError::Invalid("sessions.path is required for the file provider".to_string())
            })?;
            let root = resolve_root(path)?;
            info!(
                "initializing session context store (provider=file, root={})",
                root.display()
            );
            Ok(Arc::new(FileContextStore::new(root)?))
        }
    }
}

/// Relative storage paths resolve against the working directory.
fn resolve_root(path: &str) -> Result<PathBuf, RosterCoreError> {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().map_err(|err| RosterCoreError::Context(err.into()))?;
    debug!(
        "resolving storage root relative to cwd: {}",
        cwd.join(&path).display()
    );
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::{SessionGate, build_context_store, resolve_root};
    use pretty_assertions::assert_eq;
    use roster_rs_config::{SessionProvider, SessionsConfig};
    use roster_rs_protocol::{Action, SessionContext};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn resolve_root_keeps_absolute_paths() {
        let temp = tempdir().expect("tempdir");
        let absolute = temp.path().join("contexts");
        let resolved = resolve_root(absolute.to_str().unwrap_or_default()).expect("absolute");
        assert_eq!(resolved, absolute);

        let cwd = std::env::current_dir().expect("cwd");
        assert_eq!(resolve_root("tmp/contexts").expect("relative"), cwd.join("tmp/contexts"));
    }

    #[test]
    fn file_provider_persists_contexts() {
        let temp = tempdir().expect("tempdir");
        let config = SessionsConfig {
            provider: SessionProvider::File,
            path: Some(temp.path().to_string_lossy().to_string()),
            ..SessionsConfig::default()
        };
        let store = build_context_store(&config).expect("store");
        store
            .set("s1", SessionContext::new(Action::Find, json!({}), 0))
            .expect("set");
        assert!(temp.path().join("s1.json").exists());
    }

    #[tokio::test]
    async fn gate_serializes_same_session() {
        let gate = Arc::new(SessionGate::default());
        let guard = gate.acquire("s1").await;
        let waiting = {
            let gate = gate.clone();
            tokio::spawn(async move {
                let _guard = gate.acquire("s1").await;
            })
        };
        let _other = gate.acquire("s2").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());
        drop(guard);
        waiting.await.expect("join");
    }
}
