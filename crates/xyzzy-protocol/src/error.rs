//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means a frame could not be turned into (or
//! out of) one of the typed messages in this crate. Whether that is fatal
//! is decided by the caller: a malformed handshake reply is, a malformed
//! push frame is only logged.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// The frame was not valid JSON or did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(#[source] serde_json::Error),

    /// The frame parsed but violates the protocol.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
