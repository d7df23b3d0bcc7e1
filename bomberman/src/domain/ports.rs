// Transport seam between the session loops and a concrete socket.

use async_trait::async_trait;

/// How a read or write failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    // The peer or the transport ended the session; terminal.
    #[error("connection closed: {0}")]
    Closed(String),
    // Anything else; the caller retries after a backoff.
    #[error("transient transport fault: {0}")]
    Transient(String),
}

impl TransportError {
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed(_))
    }
}

/// One message-framed, full-duplex text connection.
#[async_trait]
pub trait Transport: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Next text message; control frames are handled by the implementation.
    async fn recv_text(&mut self) -> Result<String, TransportError>;

    /// Closes the connection; calling it again is a no-op.
    async fn close(&mut self);
}
