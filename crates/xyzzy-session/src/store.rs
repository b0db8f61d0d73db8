//! Durable session storage.
//!
//! The store is a single slot: it holds at most one [`Session`]. Saving
//! replaces it and clearing empties it. Reads and writes are synchronous;
//! the slot is tiny and touched only on login, logout, and startup.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{Session, SessionError};

/// File name used by [`FileStore::in_data_dir`].
const SESSION_FILE: &str = "session.json";

/// A place where the session survives restarts.
///
/// `Send + Sync + 'static` so the store can move into the connection task.
pub trait SessionStore: Send + Sync + 'static {
    /// Returns the stored session, if any.
    fn load(&self) -> Result<Option<Session>, SessionError>;

    /// Replaces the stored session.
    fn save(&self, session: &Session) -> Result<(), SessionError>;

    /// Removes the stored session. Clearing an empty store is not an error.
    fn clear(&self) -> Result<(), SessionError>;
}

impl<S: SessionStore + ?Sized> SessionStore for Box<S> {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        (**self).load()
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        (**self).save(session)
    }

    fn clear(&self) -> Result<(), SessionError> {
        (**self).clear()
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// A store that lives only as long as the process.
///
/// Clones share the same slot, so a caller can keep a handle and inspect
/// what the client saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<Session>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `session`.
    pub fn with_session(session: Session) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(session))),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Session>> {
        // A panic while holding the lock cannot leave a half-written
        // `Option`, so a poisoned slot is still usable.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        Ok(self.slot().clone())
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        *self.slot() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.slot() = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// A store backed by one JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// A store that reads and writes `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A store in the per-user data directory, under `app_name`.
    ///
    /// On Linux this is `$XDG_DATA_HOME/<app_name>/session.json`.
    ///
    /// # Errors
    /// Returns [`SessionError::NoDataDir`] when the platform has no such
    /// directory.
    pub fn in_data_dir(app_name: &str) -> Result<Self, SessionError> {
        let dir = dirs::data_dir().ok_or(SessionError::NoDataDir)?;
        Ok(Self::new(dir.join(app_name).join(SESSION_FILE)))
    }

    /// The file this store uses.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileStore {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(SessionError::Corrupt)
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string(session).map_err(SessionError::Encode)?;

        // Write then rename, so a crash never leaves a truncated file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "session file removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_clones_share_slot() {
        let store = MemoryStore::new();
        let handle = store.clone();
        store.save(&Session::new("u1", "t", "amy")).unwrap();
        assert_eq!(handle.load().unwrap().unwrap().id, "u1");
        handle.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_memory_store_with_session() {
        let store = MemoryStore::with_session(Session::new("u1", "t", "amy"));
        assert!(store.load().unwrap().is_some());
    }
}
