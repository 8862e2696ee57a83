//! Durable key-value backends for the session document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use hearth_domain::error::{Error, Result};
use hearth_domain::Session;

/// Persistence collaborator behind [`SessionStore`](crate::SessionStore).
pub trait DurableStore: Send + Sync {
    /// Load the session stored under `key`, or `None` if nothing was saved yet.
    fn load(&self, key: &str) -> Result<Option<Session>>;

    /// Replace the session stored under `key`.
    fn save(&self, key: &str, session: &Session) -> Result<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JSON file store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One pretty-printed JSON document per key under a state directory.
///
/// Writes go to `<key>.json.tmp` first and are renamed into place, so a
/// crash mid-write never leaves a truncated session behind.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if needed) `state_path/sessions/`.
    pub fn new(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("sessions");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl DurableStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<Session>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let session = serde_json::from_str(&raw)?;
        Ok(Some(session))
    }

    fn save(&self, key: &str, session: &Session) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(session)?;
        std::fs::write(&tmp, json).map_err(Error::Io)?;
        std::fs::rename(&tmp, &path).map_err(Error::Io)?;
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Non-persistent backend for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, Session>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored session, as if saved by an earlier run.
    pub fn with_session(key: &str, session: Session) -> Self {
        let store = Self::new();
        store.docs.lock().insert(key.to_owned(), session);
        store
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl DurableStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Session>> {
        Ok(self.docs.lock().get(key).cloned())
    }

    fn save(&self, key: &str, session: &Session) -> Result<()> {
        self.docs.lock().insert(key.to_owned(), session.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}
