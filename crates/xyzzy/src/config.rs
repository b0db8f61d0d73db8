//! Client configuration.

use std::time::Duration;

use xyzzy_protocol::PROTOCOL_VERSION;
use xyzzy_reconnect::ReconnectConfig;

/// Everything the connection task needs to know up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server URL, e.g. `ws://localhost:8080/ws`.
    pub url: String,
    /// Version tag sent in the handshake.
    pub protocol_version: String,
    /// Backoff timing for reconnection.
    pub reconnect: ReconnectConfig,
    /// How long to stay in the protocol-error state before asking the
    /// application to reload. Default: 3 s.
    pub reload_delay: Duration,
}

impl ClientConfig {
    /// A config for `url` with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocol_version: PROTOCOL_VERSION.to_owned(),
            reconnect: ReconnectConfig::default(),
            reload_delay: Duration::from_secs(3),
        }
    }

    /// Fix out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        self.reconnect = self.reconnect.validated();
        self
    }
}
