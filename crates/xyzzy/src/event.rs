//! Notifications delivered to the application.

use std::fmt;

use xyzzy_protocol::{GameEvent, ServerConfig};
use xyzzy_session::Session;
use xyzzy_state::GameSnapshot;

use crate::CallError;

/// Where the connection stands, for UI binding.
///
/// `Display` prints the stable label (`connect`, `retry_sleep(4)`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The first connection attempt is in progress.
    Connecting,
    /// A working connection was lost; waiting before redialing.
    Reconnecting,
    /// Redialing failed; waiting this many seconds before the next try.
    RetrySleep { secs: u64 },
    /// A retry dial is in progress.
    RetryReconnecting,
    /// Handshake done and, if a session exists, logged in.
    Connected,
    /// Another client took over this session. Terminal.
    ConnectedElsewhere,
    /// The server rejected this client. Terminal; a reload follows.
    ProtocolError,
}

impl ConnectionState {
    /// Whether the client will never leave this state on its own.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ConnectedElsewhere | Self::ProtocolError)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => f.write_str("connect"),
            Self::Reconnecting => f.write_str("reconnect"),
            Self::RetrySleep { secs } => write!(f, "retry_sleep({secs})"),
            Self::RetryReconnecting => f.write_str("retry_reconnect"),
            Self::Connected => f.write_str("connected"),
            Self::ConnectedElsewhere => f.write_str("connected_elsewhere"),
            Self::ProtocolError => f.write_str("protocol_error"),
        }
    }
}

/// Everything the client tells the application, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The connection state changed, or the session attached to it did.
    ConnectionStateChanged {
        state: ConnectionState,
        session: Option<Session>,
    },
    /// Server configuration from a successful handshake.
    ServerConfig(ServerConfig),
    /// The stored session was rejected on reconnect and has been cleared.
    ReloginFailed(CallError),
    /// A complete view of the current game.
    Snapshot(Box<GameSnapshot>),
    /// The user is not in a game.
    NoGame,
    /// A game event from a push frame.
    GameEvent(GameEvent),
    /// The client is unusable and must be restarted from scratch.
    ReloadRequired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_labels() {
        let labels: Vec<String> = [
            ConnectionState::Connecting,
            ConnectionState::Reconnecting,
            ConnectionState::RetrySleep { secs: 4 },
            ConnectionState::RetryReconnecting,
            ConnectionState::Connected,
            ConnectionState::ConnectedElsewhere,
            ConnectionState::ProtocolError,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        assert_eq!(
            labels,
            [
                "connect",
                "reconnect",
                "retry_sleep(4)",
                "retry_reconnect",
                "connected",
                "connected_elsewhere",
                "protocol_error"
            ]
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(ConnectionState::ConnectedElsewhere.is_terminal());
        assert!(ConnectionState::ProtocolError.is_terminal());
        assert!(!ConnectionState::RetrySleep { secs: 1 }.is_terminal());
        assert!(!ConnectionState::Connected.is_terminal());
    }
}
