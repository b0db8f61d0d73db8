//! `ClientBuilder` and the `Client` handle.
//!
//! This is the entry point for applications. It ties together all the
//! layers (transport, protocol, session, state) and spawns the connection
//! task that owns them.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use xyzzy_protocol::{ApiAction, GameListEntry, GameOptions, Params, PlayedCard};
use xyzzy_reconnect::ReconnectConfig;
use xyzzy_session::{MemoryStore, Session, SessionManager, SessionStore};
use xyzzy_transport::Connector;

use crate::driver::{Command, Driver};
use crate::{CallError, ClientConfig, ClientEvent};

/// Receives every [`ClientEvent`] in the order it happened.
pub type Events = mpsc::UnboundedReceiver<ClientEvent>;

/// Builder for configuring and starting a client.
///
/// # Example
///
/// ```rust,ignore
/// use xyzzy::prelude::*;
///
/// let (client, mut events) = Client::builder("ws://localhost:8080/ws")
///     .session_store(FileStore::in_data_dir("xyzzy")?)
///     .connect();
///
/// while let Some(event) = events.recv().await {
///     // update the UI
/// }
/// ```
pub struct ClientBuilder {
    config: ClientConfig,
    store: Box<dyn SessionStore>,
}

impl ClientBuilder {
    /// Creates a builder for `url` with default settings and an in-memory
    /// session store.
    pub fn new(url: impl Into<String>) -> Self {
        Self::from_config(ClientConfig::new(url))
    }

    /// Creates a builder from a complete configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            store: Box::new(MemoryStore::new()),
        }
    }

    /// Sets the version tag sent in the handshake.
    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.config.protocol_version = version.into();
        self
    }

    /// Sets the reconnection backoff.
    pub fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.config.reconnect = reconnect;
        self
    }

    /// Sets how long the client waits after a protocol error before
    /// emitting [`ClientEvent::ReloadRequired`].
    pub fn reload_delay(mut self, delay: Duration) -> Self {
        self.config.reload_delay = delay;
        self
    }

    /// Sets where the session is kept between runs.
    pub fn session_store(mut self, store: impl SessionStore) -> Self {
        self.store = Box::new(store);
        self
    }

    /// Connects over WebSocket.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    #[cfg(feature = "websocket")]
    pub fn connect(self) -> (Client, Events) {
        self.connect_with(xyzzy_transport::WebSocketConnector::new())
    }

    /// Connects with a custom connector, e.g. the in-memory transport.
    ///
    /// The stored session is read here, once. The first connection attempt
    /// starts immediately.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn connect_with<C: Connector>(self, connector: C) -> (Client, Events) {
        let config = self.config.validated();
        let sessions = SessionManager::restore(self.store);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let driver = Driver::new(config, connector, sessions, commands_rx, events_tx);
        tokio::spawn(driver.run());

        (
            Client {
                commands: commands_tx,
            },
            events_rx,
        )
    }
}

/// A cheap, cloneable handle to a running client.
///
/// The connection task stops when the last handle is dropped or when
/// [`shutdown`](Self::shutdown) is called.
#[derive(Debug, Clone)]
pub struct Client {
    commands: mpsc::UnboundedSender<Command>,
}

impl Client {
    /// Creates a new builder.
    pub fn builder(url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(url)
    }

    /// Makes a call that fails with [`CallError::Disconnected`] if the
    /// connection is lost before the response arrives.
    pub async fn call(&self, action: ApiAction, params: Params) -> Result<Params, CallError> {
        self.request(action, params, false).await
    }

    /// Makes a call that survives disconnection.
    ///
    /// If the connection is not ready the call is queued and sent, in
    /// submission order, once a session is logged in again. A call already
    /// written to a socket is never sent twice.
    pub async fn call_persistent(
        &self,
        action: ApiAction,
        params: Params,
    ) -> Result<Params, CallError> {
        self.request(action, params, true).await
    }

    /// Creates a new user named `name` and makes it the current session.
    pub async fn login(&self, name: impl Into<String>) -> Result<Session, CallError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Login {
            name: name.into(),
            reply,
        })?;
        rx.await.map_err(|_| CallError::Shutdown)?
    }

    /// Logs out.
    ///
    /// The stored session is removed before the server is contacted, and
    /// the in-memory session is dropped even if the call fails.
    pub async fn logout(&self) -> Result<(), CallError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Logout { reply })?;
        rx.await.map_err(|_| CallError::Shutdown)?
    }

    /// Closes the connection for good. Calling it again does nothing.
    pub async fn disconnect(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send(Command::Disconnect { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Stops the connection task. Pending calls fail with
    /// [`CallError::Shutdown`].
    pub fn shutdown(&self) {
        let _ = self.send(Command::Shutdown);
    }

    /// Whether the connection task has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    // -----------------------------------------------------------------------
    // Typed calls
    // -----------------------------------------------------------------------

    /// Lists public games.
    pub async fn game_list(&self) -> Result<Vec<GameListEntry>, CallError> {
        let result = self.call(ApiAction::GameList, Params::new()).await?;
        field(result, "games")
    }

    /// Creates a game hosted by the current user.
    pub async fn create_game(&self) -> Result<(), CallError> {
        self.call(ApiAction::CreateGame, Params::new()).await.map(drop)
    }

    /// Joins the game with `code`. Survives disconnection.
    pub async fn join_game(&self, code: &str, password: Option<&str>) -> Result<(), CallError> {
        let mut params = params([("code", code.into())]);
        if let Some(password) = password {
            params.insert("password".into(), password.into());
        }
        self.call_persistent(ApiAction::JoinGame, params)
            .await
            .map(drop)
    }

    /// Leaves the current game. Survives disconnection.
    pub async fn leave_game(&self) -> Result<(), CallError> {
        self.call_persistent(ApiAction::LeaveGame, Params::new())
            .await
            .map(drop)
    }

    /// Removes a player from the game the current user hosts.
    pub async fn kick_player(&self, user_id: &str) -> Result<(), CallError> {
        self.call(ApiAction::KickPlayer, params([("user", user_id.into())]))
            .await
            .map(drop)
    }

    /// Replaces the game options.
    pub async fn update_options(&self, options: &GameOptions) -> Result<(), CallError> {
        let params = match serde_json::to_value(options) {
            Ok(Value::Object(params)) => params,
            Ok(other) => {
                return Err(CallError::InvalidRequest(format!(
                    "options did not encode to an object: {other}"
                )));
            }
            Err(e) => return Err(CallError::InvalidRequest(e.to_string())),
        };
        self.call(ApiAction::GameOptions, params).await.map(drop)
    }

    pub async fn start_game(&self) -> Result<(), CallError> {
        self.call(ApiAction::StartGame, Params::new()).await.map(drop)
    }

    pub async fn stop_game(&self) -> Result<(), CallError> {
        self.call(ApiAction::StopGame, Params::new()).await.map(drop)
    }

    /// Plays white cards for `round`. Survives disconnection.
    pub async fn play_white(&self, round: &str, cards: &[PlayedCard]) -> Result<(), CallError> {
        let cards =
            serde_json::to_value(cards).map_err(|e| CallError::InvalidRequest(e.to_string()))?;
        self.call_persistent(
            ApiAction::PlayWhite,
            params([("round", round.into()), ("cards", cards)]),
        )
        .await
        .map(drop)
    }

    /// Picks the winning card for `round`. Survives disconnection.
    pub async fn choose_winner(&self, round: &str, winner: &str) -> Result<(), CallError> {
        self.call_persistent(
            ApiAction::ChooseWinner,
            params([("round", round.into()), ("winner", winner.into())]),
        )
        .await
        .map(drop)
    }

    /// Sends a chat message to the current game.
    pub async fn chat(&self, text: &str) -> Result<(), CallError> {
        self.call(ApiAction::Chat, params([("text", text.into())]))
            .await
            .map(drop)
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    async fn request(
        &self,
        action: ApiAction,
        params: Params,
        persistent: bool,
    ) -> Result<Params, CallError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Call {
            action,
            params,
            persistent,
            reply,
        })?;
        rx.await.map_err(|_| CallError::Shutdown)?
    }

    fn send(&self, command: Command) -> Result<(), CallError> {
        self.commands.send(command).map_err(|_| CallError::Shutdown)
    }
}

fn params<const N: usize>(pairs: [(&str, Value); N]) -> Params {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect()
}

fn field<T: DeserializeOwned>(mut result: Params, key: &str) -> Result<T, CallError> {
    let value = result
        .remove(key)
        .ok_or_else(|| CallError::InvalidResponse(format!("missing `{key}`")))?;
    serde_json::from_value(value).map_err(|e| CallError::InvalidResponse(e.to_string()))
}
