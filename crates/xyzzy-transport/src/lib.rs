//! Client-side transport abstraction for xyzzy.
//!
//! The connection manager talks to the game server over a bidirectional,
//! message-oriented socket that carries UTF-8 text frames and reports a
//! numeric close code when it goes away. This crate hides the concrete
//! socket behind two traits:
//!
//! - [`Connector`] dials a URL and produces a [`Connection`].
//! - [`Connection`] sends and receives text frames and closes with a code.
//!
//! Two implementations ship with the crate: WebSocket (behind the
//! `websocket` feature) and an in-process [`memory`] pair used by tests and
//! by bots that run next to the server.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

mod error;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketConnector};

/// Close code for an orderly shutdown initiated by either side.
pub const CLOSE_NORMAL: u16 = 1000;

/// Counter shared by every connector so ids stay unique per process.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one socket for the lifetime of the process.
///
/// The connection manager tags every inbound frame with the id of the
/// socket it arrived on, so frames from a socket it already abandoned can
/// be recognized and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw id. Mostly useful in tests; real sockets use [`next`](Self::next).
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-wide unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why and how a connection ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CloseReason {
    /// The close code sent by the peer, or `None` when the socket dropped
    /// without a close frame (an abnormal closure).
    pub code: Option<u16>,
    /// Human-readable reason text. Often empty.
    pub reason: String,
}

impl CloseReason {
    /// A close carrying an explicit code.
    pub fn with_code(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            reason: reason.into(),
        }
    }

    /// A close that arrived without any close frame.
    pub fn abnormal() -> Self {
        Self::default()
    }
}

/// One item read from a [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A complete text frame.
    Text(String),
    /// The connection is closed. No further items follow.
    Closed(CloseReason),
}

/// Opens connections to a server.
///
/// The returned futures are `Send` so the caller can dial from a spawned
/// task without blocking its own loop.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Dials `url` and completes once the connection is open.
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single open connection that exchanges text frames.
///
/// All methods take `&self`; a connection is shared between a reader task
/// and a writer task through an `Arc`.
pub trait Connection: Send + Sync + 'static {
    /// Sends one text frame to the remote peer.
    fn send(&self, text: String) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns [`Inbound::Closed`] once when the peer closes or the socket
    /// drops.
    fn recv(&self) -> impl Future<Output = Result<Inbound, TransportError>> + Send;

    /// Closes the connection with the given close code.
    fn close(
        &self,
        code: u16,
        reason: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
