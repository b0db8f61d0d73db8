//! The connection task: owns the socket, the pending calls, the session,
//! and the game-state assembler.
//!
//! One task runs per client. It reacts to one input at a time, so none of
//! its state needs a lock:
//!   1. Commands from [`Client`](crate::Client) handles
//!   2. Link events: dial results plus frames and closes from the current
//!      socket's reader and writer tasks
//!   3. The reconnect timer
//!   4. The reload timer, armed after a protocol error
//!
//! Writes never block the task. Each socket has a writer task fed by an
//! unbounded channel, so "sending" a frame only enqueues it.

use std::future;
use std::mem;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, trace, warn};
use xyzzy_protocol::{
    ApiAction, AuthenticateResult, CLOSE_PROTOCOL_ERROR, CallRequest, CallResponse, Codec,
    Credentials, DISCONNECT_CONNECTED_ELSEWHERE, HandshakeRequest, HandshakeResponse, JsonCodec,
    Params, PushUpdate, ServerFrame,
};
use xyzzy_reconnect::{ReconnectScheduler, RetryKind};
use xyzzy_session::{Session, SessionManager};
use xyzzy_state::{Dispatch, StateAssembler};
use xyzzy_transport::{
    CLOSE_NORMAL, CloseReason, Connection, ConnectionId, Connector, Inbound, TransportError,
};

use crate::registry::{CallRegistry, CallResult, Continuation, PendingCall};
use crate::{CallError, ClientConfig, ClientEvent, ConnectionState};

/// Requests sent from a `Client` handle to the connection task.
#[derive(Debug)]
pub(crate) enum Command {
    Call {
        action: ApiAction,
        params: Params,
        persistent: bool,
        reply: oneshot::Sender<CallResult>,
    },
    Login {
        name: String,
        reply: oneshot::Sender<Result<Session, CallError>>,
    },
    Logout {
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Reports from dial, reader, and writer tasks.
///
/// Socket events carry the id of the socket they came from; events from a
/// socket that is no longer current are ignored.
enum LinkEvent<T> {
    Dialed {
        dial: u64,
        result: Result<T, TransportError>,
    },
    Frame {
        conn: ConnectionId,
        text: String,
    },
    Closed {
        conn: ConnectionId,
        reason: CloseReason,
    },
    Failed {
        conn: ConnectionId,
        error: TransportError,
    },
}

/// Frames queued for a socket's writer task.
enum Outbound {
    Text(String),
    Close { code: u16, reason: String },
}

/// The socket currently in use, and how far it has progressed.
struct Link {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<Outbound>,
    reader: JoinHandle<()>,
    handshaked: bool,
    authenticated: bool,
}

impl Link {
    /// Queues a text frame. Returns `false` if the writer has stopped.
    fn send(&self, text: String) -> bool {
        self.outbound.send(Outbound::Text(text)).is_ok()
    }

    /// Closes the socket on our side. Its later events are stale.
    fn close(self, code: u16, reason: &str) {
        let _ = self.outbound.send(Outbound::Close {
            code,
            reason: reason.to_owned(),
        });
        self.reader.abort();
    }

    /// Forgets a socket that is already dead. Dropping `outbound` stops
    /// the writer.
    fn discard(self) {
        self.reader.abort();
    }
}

pub(crate) struct Driver<C: Connector> {
    config: ClientConfig,
    connector: Arc<C>,
    codec: JsonCodec,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ClientEvent>,
    link_tx: mpsc::UnboundedSender<LinkEvent<C::Connection>>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent<C::Connection>>,
    link: Option<Link>,
    /// Sequence number of the newest dial; older dial results are stale.
    dial_seq: u64,
    dialing: Option<u64>,
    scheduler: ReconnectScheduler,
    registry: CallRegistry,
    sessions: SessionManager,
    assembler: StateAssembler,
    state: ConnectionState,
    /// Set by an explicit disconnect; no reconnects after that.
    closing: bool,
    reload_at: Option<Instant>,
}

impl<C: Connector> Driver<C> {
    pub(crate) fn new(
        config: ClientConfig,
        connector: C,
        sessions: SessionManager,
        commands: mpsc::UnboundedReceiver<Command>,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> Self {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        Self {
            scheduler: ReconnectScheduler::new(config.reconnect.clone()),
            config,
            connector: Arc::new(connector),
            codec: JsonCodec,
            commands,
            events,
            link_tx,
            link_rx,
            link: None,
            dial_seq: 0,
            dialing: None,
            registry: CallRegistry::new(),
            sessions,
            assembler: StateAssembler::new(),
            state: ConnectionState::Connecting,
            closing: false,
            reload_at: None,
        }
    }

    /// Runs until every `Client` handle is gone, `shutdown` is requested,
    /// or a protocol error has run its reload delay.
    pub(crate) async fn run(mut self) {
        info!(url = %self.config.url, "connection task started");
        self.report(ConnectionState::Connecting);
        self.dial();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.link_rx.recv() => self.handle_link_event(event),
                kind = self.scheduler.wait_for_retry() => self.retry(kind),
                () = sleep_until(self.reload_at) => {
                    warn!("reload required");
                    self.emit(ClientEvent::ReloadRequired);
                    break;
                }
            }
        }

        self.shutdown();
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Call {
                action,
                params,
                persistent,
                reply,
            } => self.issue(action, &params, persistent, Continuation::Reply(reply)),
            Command::Login { name, reply } => {
                let params = Credentials::Name { name }.into_params();
                self.issue(ApiAction::Authenticate, &params, false, Continuation::Login(reply));
            }
            Command::Logout { reply } => {
                // The durable copy goes first so a failed call still logs out locally.
                if let Err(e) = self.sessions.clear_stored() {
                    warn!(error = %e, "failed to clear stored session");
                }
                self.issue(ApiAction::LogOut, &Params::new(), false, Continuation::Logout(reply));
            }
            Command::Disconnect { reply } => {
                self.disconnect();
                let _ = reply.send(());
            }
            Command::Shutdown => {}
        }
    }

    /// Registers a call and sends it if the connection allows.
    fn issue(
        &mut self,
        action: ApiAction,
        params: &Params,
        persistent: bool,
        continuation: Continuation,
    ) {
        let call_id = self.registry.next_id();
        let request = match self.codec.encode(&CallRequest {
            action,
            call_id,
            params,
        }) {
            Ok(request) => request,
            Err(e) => {
                continuation.reject(CallError::InvalidRequest(e.to_string()));
                return;
            }
        };

        if self.closing || self.state.is_terminal() {
            debug!(%call_id, %action, "client will not reconnect; failing call");
            self.settle(continuation, Err(CallError::Disconnected));
            return;
        }

        let eligible = self.can_send(action);
        if !eligible && !persistent {
            debug!(%call_id, %action, "connection not ready; failing call");
            self.settle(continuation, Err(CallError::Disconnected));
            return;
        }

        let sent_on = if eligible {
            self.transmit(request.clone())
        } else {
            None
        };
        debug!(%call_id, %action, persistent, sent = sent_on.is_some(), "call issued");
        self.registry.insert(PendingCall {
            call_id,
            action,
            persistent,
            request,
            sent_on,
            continuation,
        });
    }

    /// Authentication needs a handshake; everything else needs a login.
    fn can_send(&self, action: ApiAction) -> bool {
        match &self.link {
            Some(link) if link.handshaked => {
                action == ApiAction::Authenticate || link.authenticated
            }
            _ => false,
        }
    }

    /// Queues `text` on the current link; returns the link it went to.
    fn transmit(&self, text: String) -> Option<ConnectionId> {
        self.link
            .as_ref()
            .filter(move |link| link.send(text))
            .map(|link| link.id)
    }

    /// Queued calls go out in submission order.
    fn flush(&mut self) {
        let Some(link) = &self.link else {
            return;
        };
        for call in self.registry.unsent_mut() {
            call.sent_on = link.send(call.request.clone()).then_some(link.id);
            debug!(call_id = %call.call_id, action = %call.action, "sent queued call");
        }
    }

    /// Delivers a call's outcome to whoever is waiting on it.
    fn settle(&mut self, continuation: Continuation, result: CallResult) {
        match continuation {
            Continuation::Reply(reply) => {
                if result.as_ref().is_err_and(CallError::is_not_authenticated) {
                    warn!("server reports the session as not authenticated");
                    self.clear_session();
                    self.report_if_handshaked();
                }
                let _ = reply.send(result);
            }
            Continuation::Login(reply) => {
                let outcome = result.and_then(parse_session);
                if let Ok(session) = &outcome {
                    self.authenticated(session.clone());
                }
                let _ = reply.send(outcome);
            }
            Continuation::Relogin => match result.and_then(parse_session) {
                Ok(session) => self.authenticated(session),
                Err(CallError::Disconnected) => {
                    debug!("relogin interrupted by disconnection; will retry after reconnect");
                }
                Err(error) => {
                    warn!(%error, "relogin rejected; clearing session");
                    self.clear_session();
                    self.emit(ClientEvent::ReloginFailed(error));
                    self.report_if_handshaked();
                }
            },
            Continuation::Logout(reply) => {
                self.end_session();
                self.report_if_handshaked();
                let _ = reply.send(result.map(|_| ()));
            }
        }
    }

    fn disconnect(&mut self) {
        if self.closing {
            return;
        }
        info!("disconnect requested");
        self.closing = true;
        self.scheduler.cancel();
        self.dialing = None;
        if let Some(link) = self.link.take() {
            link.close(CLOSE_NORMAL, "client disconnect");
        }
        self.fail_all();
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    fn authenticated(&mut self, session: Session) {
        if let Err(e) = self.sessions.establish(session) {
            warn!(error = %e, "failed to persist session");
        }
        if let Some(link) = &mut self.link {
            link.authenticated = true;
        }
        // Queued calls must be on the wire before anyone hears about the
        // session, or calls made in reaction to it would overtake them.
        self.flush();
        self.report(ConnectionState::Connected);
    }

    /// Drops the session in memory and in storage.
    fn clear_session(&mut self) {
        if let Err(e) = self.sessions.clear() {
            warn!(error = %e, "failed to clear stored session");
        }
        self.end_session();
    }

    /// Drops the in-memory session and everything tied to it.
    ///
    /// Every pending call belongs to the old identity and is rejected. Calls
    /// still on the live link get an answer later; it is dropped.
    fn end_session(&mut self) {
        self.sessions.forget();
        let live = self.link.as_mut().map(|link| {
            link.authenticated = false;
            link.id
        });
        self.assembler.reset();
        for call in self.registry.take_all() {
            if call.sent_on.is_some() && call.sent_on == live {
                self.registry.abandon(call.call_id);
            }
            debug!(call_id = %call.call_id, action = %call.action, "rejecting call on session end");
            call.continuation.reject(CallError::SessionCleared);
        }
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    fn dial(&mut self) {
        let attempts = self.scheduler.record_attempt();
        self.dial_seq += 1;
        let dial = self.dial_seq;
        self.dialing = Some(dial);
        debug!(attempts, url = %self.config.url, "dialing");

        let connector = Arc::clone(&self.connector);
        let url = self.config.url.clone();
        let link_tx = self.link_tx.clone();
        tokio::spawn(async move {
            let result = connector.connect(&url).await;
            let _ = link_tx.send(LinkEvent::Dialed { dial, result });
        });
    }

    fn retry(&mut self, kind: RetryKind) {
        if kind == RetryKind::Retry {
            self.report(ConnectionState::RetryReconnecting);
        }
        self.dial();
    }

    fn handle_link_event(&mut self, event: LinkEvent<C::Connection>) {
        match event {
            LinkEvent::Dialed { dial, result } => self.dialed(dial, result),
            LinkEvent::Frame { conn, text } if self.is_current(conn) => self.frame(&text),
            LinkEvent::Closed { conn, reason } if self.is_current(conn) => self.closed(reason),
            LinkEvent::Failed { conn, error } if self.is_current(conn) => {
                warn!(%conn, %error, "connection failed");
                self.lost();
            }
            LinkEvent::Frame { conn, .. }
            | LinkEvent::Closed { conn, .. }
            | LinkEvent::Failed { conn, .. } => {
                trace!(%conn, "ignoring event from stale connection");
            }
        }
    }

    fn is_current(&self, conn: ConnectionId) -> bool {
        self.link.as_ref().is_some_and(|link| link.id == conn)
    }

    fn dialed(&mut self, dial: u64, result: Result<C::Connection, TransportError>) {
        if self.dialing != Some(dial) {
            if let Ok(conn) = result {
                debug!(id = %conn.id(), "closing superseded connection");
                tokio::spawn(async move {
                    let _ = conn.close(CLOSE_NORMAL, "superseded").await;
                });
            }
            return;
        }
        self.dialing = None;

        match result {
            Ok(conn) => self.open(conn),
            Err(error) => {
                warn!(%error, attempts = self.scheduler.attempts(), "connection attempt failed");
                self.lost();
            }
        }
    }

    /// Adopts a freshly dialed socket and starts the handshake.
    fn open(&mut self, conn: C::Connection) {
        let conn = Arc::new(conn);
        let id = conn.id();
        // Answers owed on earlier sockets will never arrive.
        self.registry.clear_abandoned();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(Arc::clone(&conn), self.link_tx.clone()));
        tokio::spawn(write_loop(conn, outbound_rx, self.link_tx.clone()));

        let link = Link {
            id,
            outbound,
            reader,
            handshaked: false,
            authenticated: false,
        };
        let handshake = HandshakeRequest::new(self.config.protocol_version.clone());
        match self.codec.encode(&handshake) {
            Ok(text) => {
                info!(%id, version = %handshake.version, "connected; sending handshake");
                link.send(text);
                self.link = Some(link);
            }
            Err(e) => {
                self.link = Some(link);
                self.protocol_error(&format!("cannot encode handshake: {e}"));
            }
        }
    }

    fn is_handshaked(&self) -> bool {
        self.link.as_ref().is_some_and(|link| link.handshaked)
    }

    fn frame(&mut self, text: &str) {
        if !self.is_handshaked() {
            self.handshake_reply(text);
            return;
        }

        let frame = self
            .codec
            .decode::<Value>(text)
            .and_then(ServerFrame::from_value);
        match frame {
            Ok(ServerFrame::Disconnect(reason)) => self.disconnect_frame(&reason),
            Ok(ServerFrame::Response(response)) => self.response(response),
            Ok(ServerFrame::Push(update)) => self.push(update),
            Err(e) => warn!(error = %e, "dropping malformed frame"),
        }
    }

    fn handshake_reply(&mut self, text: &str) {
        let reply = self
            .codec
            .decode::<Value>(text)
            .and_then(HandshakeResponse::from_value);
        match reply {
            Ok(HandshakeResponse::Accepted(config)) => {
                if let Some(link) = &mut self.link {
                    link.handshaked = true;
                }
                self.scheduler.reset();
                info!("handshake complete");
                self.emit(ClientEvent::ServerConfig(config));

                match self.sessions.current().map(Session::credentials) {
                    Some(credentials) => {
                        info!("logging back in with stored session");
                        self.issue(
                            ApiAction::Authenticate,
                            &credentials.into_params(),
                            false,
                            Continuation::Relogin,
                        );
                    }
                    None => self.report(ConnectionState::Connected),
                }
            }
            Ok(HandshakeResponse::Rejected(code)) => {
                self.protocol_error(&format!("handshake rejected: {code}"));
            }
            Err(e) => self.protocol_error(&format!("malformed handshake reply: {e}")),
        }
    }

    fn disconnect_frame(&mut self, reason: &str) {
        if reason != DISCONNECT_CONNECTED_ELSEWHERE {
            warn!(reason, "ignoring disconnect frame with unknown reason");
            return;
        }
        warn!("session taken over by another client");
        if let Some(link) = self.link.take() {
            link.close(CLOSE_NORMAL, "connected elsewhere");
        }
        self.scheduler.cancel();
        self.fail_all();
        self.report(ConnectionState::ConnectedElsewhere);
    }

    fn response(&mut self, response: CallResponse) {
        let Some(call) = self.registry.take(response.call_id) else {
            if self.registry.take_abandoned(response.call_id) {
                debug!(call_id = %response.call_id, "dropping answer to abandoned call");
                return;
            }
            self.protocol_error(&format!("response for unknown {}", response.call_id));
            return;
        };
        debug!(
            call_id = %call.call_id,
            action = %call.action,
            ok = response.outcome.is_ok(),
            "call settled"
        );
        self.settle(call.continuation, response.outcome.map_err(CallError::from));
    }

    fn push(&mut self, mut update: PushUpdate) {
        if !self.sessions.is_active() {
            debug!("ignoring push frame without a session");
            return;
        }
        for event in mem::take(&mut update.events) {
            self.emit(ClientEvent::GameEvent(event));
        }
        match self.assembler.apply(update) {
            Some(Dispatch::Snapshot(snapshot)) => self.emit(ClientEvent::Snapshot(Box::new(snapshot))),
            Some(Dispatch::NoGame) => self.emit(ClientEvent::NoGame),
            None => {}
        }
    }

    fn closed(&mut self, reason: CloseReason) {
        if reason.code == Some(CLOSE_PROTOCOL_ERROR) {
            if let Some(link) = self.link.take() {
                link.discard();
            }
            self.protocol_error(&format!(
                "server closed with code {CLOSE_PROTOCOL_ERROR}: {}",
                reason.reason
            ));
            return;
        }
        info!(code = ?reason.code, reason = %reason.reason, "connection closed");
        self.lost();
    }

    /// Ordinary disconnection: clean up and schedule a reconnect.
    fn lost(&mut self) {
        if let Some(link) = self.link.take() {
            link.discard();
        }
        self.fail_ephemeral();
        if self.closing || self.state.is_terminal() {
            return;
        }

        let plan = self.scheduler.schedule();
        let state = match plan.kind {
            RetryKind::Reconnect => ConnectionState::Reconnecting,
            RetryKind::Retry => ConnectionState::RetrySleep {
                secs: plan.delay_secs(),
            },
        };
        info!(attempts = plan.attempts, delay_ms = plan.delay.as_millis() as u64, "reconnect scheduled");
        self.report(state);
    }

    fn fail_ephemeral(&mut self) {
        for call in self.registry.take_ephemeral() {
            debug!(call_id = %call.call_id, action = %call.action, "failing call on disconnect");
            self.settle(call.continuation, Err(CallError::Disconnected));
        }
    }

    /// No reconnect will follow, so persistent calls fail too.
    fn fail_all(&mut self) {
        for call in self.registry.take_all() {
            debug!(call_id = %call.call_id, action = %call.action, "failing call for good");
            self.settle(call.continuation, Err(CallError::Disconnected));
        }
    }

    /// Fatal: stop talking to this server and ask for a reload.
    fn protocol_error(&mut self, reason: &str) {
        if self.state == ConnectionState::ProtocolError {
            return;
        }
        error!(reason, "protocol error; client must reload");
        if let Some(link) = self.link.take() {
            link.close(CLOSE_NORMAL, "protocol error");
        }
        self.dialing = None;
        self.scheduler.cancel();
        self.fail_ephemeral();
        self.report(ConnectionState::ProtocolError);
        self.reload_at = Some(Instant::now() + self.config.reload_delay);
    }

    fn shutdown(&mut self) {
        info!(pending = self.registry.len(), "connection task stopping");
        self.scheduler.cancel();
        if let Some(link) = self.link.take() {
            link.close(CLOSE_NORMAL, "client shut down");
        }
        for call in self.registry.take_all() {
            call.continuation.reject(CallError::Shutdown);
        }
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    fn report(&mut self, state: ConnectionState) {
        if self.state != state {
            info!(from = %self.state, to = %state, "connection state changed");
        }
        self.state = state;
        let session = self.sessions.current().cloned();
        self.emit(ClientEvent::ConnectionStateChanged { state, session });
    }

    fn report_if_handshaked(&mut self) {
        if self.is_handshaked() {
            self.report(ConnectionState::Connected);
        }
    }

    fn emit(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            trace!("event receiver dropped");
        }
    }
}

fn parse_session(result: Params) -> Result<Session, CallError> {
    serde_json::from_value::<AuthenticateResult>(Value::Object(result))
        .map(Session::from)
        .map_err(|e| CallError::InvalidResponse(e.to_string()))
}

/// Pends forever when no deadline is set.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

async fn read_loop<T: Connection>(conn: Arc<T>, events: mpsc::UnboundedSender<LinkEvent<T>>) {
    let id = conn.id();
    loop {
        let event = match conn.recv().await {
            Ok(Inbound::Text(text)) => LinkEvent::Frame { conn: id, text },
            Ok(Inbound::Closed(reason)) => LinkEvent::Closed { conn: id, reason },
            Err(error) => LinkEvent::Failed { conn: id, error },
        };
        let last = !matches!(event, LinkEvent::Frame { .. });
        if events.send(event).is_err() || last {
            break;
        }
    }
    trace!(%id, "reader stopped");
}

async fn write_loop<T: Connection>(
    conn: Arc<T>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<LinkEvent<T>>,
) {
    let id = conn.id();
    while let Some(frame) = outbound.recv().await {
        match frame {
            Outbound::Text(text) => {
                if let Err(error) = conn.send(text).await {
                    let _ = events.send(LinkEvent::Failed { conn: id, error });
                    break;
                }
            }
            Outbound::Close { code, reason } => {
                if let Err(error) = conn.close(code, &reason).await {
                    debug!(%id, %error, "close failed");
                }
                break;
            }
        }
    }
    trace!(%id, "writer stopped");
}
