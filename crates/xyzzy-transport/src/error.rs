/// Failures of the underlying socket.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening the connection failed (DNS, TCP, or the WebSocket upgrade).
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The socket is gone; carries whatever the peer or library said.
    #[error("socket closed: {0}")]
    ConnectionClosed(String),

    /// Sending a frame failed.
    #[error("failed to send frame: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving a frame failed.
    #[error("failed to read frame: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}
