//! Session identity for the xyzzy client.
//!
//! A user who logs in receives an id and a secret token. Both are kept in
//! durable storage so the client can log back in automatically after a
//! reconnect or a restart.
//!
//! 1. **Identity**: the [`Session`] value itself
//! 2. **Storage**: where it survives restarts ([`SessionStore`], with
//!    [`MemoryStore`] and [`FileStore`])
//! 3. **Tracking**: the in-memory copy plus its store ([`SessionManager`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Client (above)  ← asks the manager whether a session exists, relogs in
//!     ↕
//! Session Layer (this crate)  ← identity and persistence
//!     ↕
//! Protocol Layer (below)  ← provides AuthenticateResult, Credentials
//! ```

mod error;
mod manager;
mod session;
mod store;

pub use error::SessionError;
pub use manager::SessionManager;
pub use session::Session;
pub use store::{FileStore, MemoryStore, SessionStore};
