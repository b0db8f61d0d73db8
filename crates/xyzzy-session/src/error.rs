//! Error types for the session layer.

/// Errors that can occur while loading or saving the session.
///
/// None of these are fatal to the connection: the client logs them and
/// carries on with whatever it has in memory.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Reading or writing the session file failed.
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The stored session could not be parsed.
    #[error("stored session is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),

    /// The session could not be serialized.
    #[error("failed to encode session: {0}")]
    Encode(#[source] serde_json::Error),

    /// The platform has no per-user data directory.
    #[error("no data directory available on this platform")]
    NoDataDir,
}
