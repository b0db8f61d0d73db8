//! In-process transport built on Tokio channels.
//!
//! [`listen`] returns a connected [`MemoryConnector`] / [`MemoryListener`]
//! pair. Every successful [`Connector::connect`] creates two linked
//! [`MemoryConnection`] ends: the client keeps one and the listener hands
//! the other to whoever plays the server. Both ends speak the same
//! [`Connection`] trait, so a test server drives its end exactly like the
//! client drives its own.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};

use crate::{CloseReason, Connection, ConnectionId, Connector, Inbound, TransportError};

/// Creates a linked pair of connection ends.
pub fn channel() -> (MemoryConnection, MemoryConnection) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (MemoryConnection::new(b_tx, a_rx), MemoryConnection::new(a_tx, b_rx))
}

/// Creates a connector and the listener that receives its connections.
pub fn listen() -> (MemoryConnector, MemoryListener) {
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared::default());
    (
        MemoryConnector {
            accept_tx,
            shared: Arc::clone(&shared),
        },
        MemoryListener { accept_rx, shared },
    )
}

#[derive(Debug, Default)]
struct Shared {
    refusing: AtomicBool,
    attempts: AtomicU64,
}

/// Client side of an in-process transport.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<MemoryConnection>,
    shared: Arc<Shared>,
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self, url: &str) -> Result<MemoryConnection, TransportError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        if self.shared.refusing.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "memory listener is refusing connections",
            )));
        }

        let (client, server) = channel();
        self.accept_tx.send(server).map_err(|_| {
            TransportError::ConnectFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "memory listener dropped",
            ))
        })?;
        tracing::debug!(id = %client.id(), url, "opened in-memory connection");
        Ok(client)
    }
}

/// Server side of an in-process transport.
#[derive(Debug)]
pub struct MemoryListener {
    accept_rx: mpsc::UnboundedReceiver<MemoryConnection>,
    shared: Arc<Shared>,
}

impl MemoryListener {
    /// Waits for the next client connection.
    ///
    /// Returns `None` once every connector has been dropped.
    pub async fn accept(&mut self) -> Option<MemoryConnection> {
        self.accept_rx.recv().await
    }

    /// While `true`, connection attempts fail as if the server were down.
    pub fn set_refusing(&self, refusing: bool) {
        self.shared.refusing.store(refusing, Ordering::SeqCst);
    }

    /// Number of connection attempts seen so far, refused ones included.
    pub fn attempts(&self) -> u64 {
        self.shared.attempts.load(Ordering::SeqCst)
    }
}

/// One end of an in-process connection.
#[derive(Debug)]
pub struct MemoryConnection {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Inbound>,
    rx: Mutex<mpsc::UnboundedReceiver<Inbound>>,
    closed: AtomicBool,
}

impl MemoryConnection {
    fn new(tx: mpsc::UnboundedSender<Inbound>, rx: mpsc::UnboundedReceiver<Inbound>) -> Self {
        Self {
            id: ConnectionId::next(),
            tx,
            rx: Mutex::new(rx),
            closed: AtomicBool::new(false),
        }
    }

    /// Whether [`Connection::close`] has been called on this end.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Connection for MemoryConnection {
    async fn send(&self, text: String) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed(format!("{} is closed", self.id)));
        }
        self.tx
            .send(Inbound::Text(text))
            .map_err(|_| TransportError::ConnectionClosed(format!("peer of {} dropped", self.id)))
    }

    async fn recv(&self) -> Result<Inbound, TransportError> {
        // A peer that vanishes without closing looks like an abnormal closure.
        Ok(self
            .rx
            .lock()
            .await
            .recv()
            .await
            .unwrap_or_else(|| Inbound::Closed(CloseReason::abnormal())))
    }

    async fn close(&self, code: u16, reason: &str) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // The peer may already be gone; closing is still complete locally.
        let _ = self
            .tx
            .send(Inbound::Closed(CloseReason::with_code(code, reason)));
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_delivers_text_both_ways() {
        let (a, b) = channel();
        a.send("ping".into()).await.unwrap();
        assert_eq!(b.recv().await.unwrap(), Inbound::Text("ping".into()));
        b.send("pong".into()).await.unwrap();
        assert_eq!(a.recv().await.unwrap(), Inbound::Text("pong".into()));
    }

    #[tokio::test]
    async fn test_close_reports_code_to_peer() {
        let (a, b) = channel();
        a.close(1003, "unsupported").await.unwrap();
        assert!(a.is_closed());
        assert_eq!(
            b.recv().await.unwrap(),
            Inbound::Closed(CloseReason::with_code(1003, "unsupported"))
        );
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (a, _b) = channel();
        a.close(1000, "").await.unwrap();
        let err = a.send("late".into()).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed(_)));
    }

    #[tokio::test]
    async fn test_dropped_peer_reads_as_abnormal_close() {
        let (a, b) = channel();
        drop(b);
        assert_eq!(a.recv().await.unwrap(), Inbound::Closed(CloseReason::abnormal()));
    }

    #[tokio::test]
    async fn test_connector_hands_server_end_to_listener() {
        let (connector, mut listener) = listen();
        let client = connector.connect("memory://test").await.unwrap();
        let server = listener.accept().await.unwrap();

        client.send("hello".into()).await.unwrap();
        assert_eq!(server.recv().await.unwrap(), Inbound::Text("hello".into()));
        assert_eq!(listener.attempts(), 1);
    }

    #[tokio::test]
    async fn test_refusing_listener_rejects_connect() {
        let (connector, listener) = listen();
        listener.set_refusing(true);
        let err = connector.connect("memory://test").await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectFailed(_)));
        assert_eq!(listener.attempts(), 1);

        listener.set_refusing(false);
        assert!(connector.connect("memory://test").await.is_ok());
        assert_eq!(listener.attempts(), 2);
    }

    #[tokio::test]
    async fn test_dropped_listener_rejects_connect() {
        let (connector, listener) = listen();
        drop(listener);
        assert!(connector.connect("memory://test").await.is_err());
    }
}
