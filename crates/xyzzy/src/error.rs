//! Error types for the client.

use xyzzy_protocol::{CallFailure, NOT_AUTHENTICATED, ProtocolError};
use xyzzy_session::SessionError;
use xyzzy_transport::TransportError;

/// Why a call did not produce a result.
///
/// Every call settles exactly once, either with its result or with one
/// of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// The connection was not usable, or dropped before the response came.
    #[error("disconnected")]
    Disconnected,

    /// The session was cleared while the call was still queued.
    #[error("session cleared")]
    SessionCleared,

    /// The connection task has stopped.
    #[error("client shut down")]
    Shutdown,

    /// The server answered with an error.
    #[error("{code}: {description}")]
    Application { code: String, description: String },

    /// The call could not be encoded.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The server's result did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl CallError {
    /// Whether the server reported the session as not authenticated.
    pub fn is_not_authenticated(&self) -> bool {
        matches!(self, Self::Application { code, .. } if code == NOT_AUTHENTICATED)
    }

    /// The server's error code, for application errors.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Application { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<CallFailure> for CallError {
    fn from(failure: CallFailure) -> Self {
        Self::Application {
            code: failure.code,
            description: failure.description,
        }
    }
}

/// Any error the client surfaces outside of a single call.
///
/// Each layer's error converts into it, so application code can use `?`
/// across the whole stack.
#[derive(Debug, thiserror::Error)]
pub enum XyzzyError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session storage error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A call failed.
    #[error(transparent)]
    Call(#[from] CallError),
}
