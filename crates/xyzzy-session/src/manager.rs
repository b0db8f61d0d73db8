//! The session manager: the in-memory session plus its durable copy.
//!
//! The two copies can differ on purpose. Logging out clears the durable
//! copy before the `log_out` call goes out, so a crash mid-logout never
//! resurrects the user, while the in-memory copy stays until the call
//! settles.
//!
//! # Concurrency note
//!
//! `SessionManager` is owned by the single connection task and needs no
//! locking of its own.

use crate::{Session, SessionError, SessionStore};

/// Tracks the current session and keeps the store in step with it.
pub struct SessionManager {
    store: Box<dyn SessionStore>,
    current: Option<Session>,
}

impl SessionManager {
    /// Creates a manager with no current session, ignoring whatever the
    /// store holds.
    pub fn new(store: impl SessionStore) -> Self {
        Self {
            store: Box::new(store),
            current: None,
        }
    }

    /// Creates a manager primed with the stored session, if any.
    ///
    /// A store that cannot be read is treated as empty. A corrupt entry is
    /// also removed so the next start does not trip over it again.
    pub fn restore(store: impl SessionStore) -> Self {
        let mut manager = Self::new(store);
        match manager.store.load() {
            Ok(Some(session)) => {
                tracing::info!(id = %session.id, name = %session.name, "restored stored session");
                manager.current = Some(session);
            }
            Ok(None) => tracing::debug!("no stored session"),
            Err(SessionError::Corrupt(e)) => {
                tracing::warn!(error = %e, "discarding corrupt stored session");
                if let Err(e) = manager.store.clear() {
                    tracing::warn!(error = %e, "failed to remove corrupt session");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to load stored session"),
        }
        manager
    }

    /// The current session, if one is active.
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Whether a session is active.
    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Makes `session` current and persists it.
    ///
    /// The in-memory session is replaced even when persisting fails.
    ///
    /// # Errors
    /// Returns the store's error if the session could not be saved.
    pub fn establish(&mut self, session: Session) -> Result<(), SessionError> {
        tracing::info!(id = %session.id, name = %session.name, "session established");
        let saved = self.store.save(&session);
        self.current = Some(session);
        saved
    }

    /// Removes only the durable copy. The in-memory session stays.
    ///
    /// # Errors
    /// Returns the store's error if the entry could not be removed.
    pub fn clear_stored(&self) -> Result<(), SessionError> {
        self.store.clear()
    }

    /// Drops the in-memory session without touching the store.
    pub fn forget(&mut self) -> Option<Session> {
        self.current.take()
    }

    /// Drops the session everywhere.
    ///
    /// The in-memory session is dropped even when the store fails.
    ///
    /// # Errors
    /// Returns the store's error if the entry could not be removed.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        if let Some(session) = self.current.take() {
            tracing::info!(id = %session.id, "session cleared");
        }
        self.store.clear()
    }
}
