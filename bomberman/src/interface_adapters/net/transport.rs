// WebSocket implementation of the transport port, plus the fault
// classification shared by both ends of a session.

use crate::domain::{Transport, TransportError};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::error::Error as StdError;
use std::io;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message, error::ProtocolError};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

/// Decides whether a read/write failure ended the session.
///
/// Walks the source chain so wrapped errors (axum wraps tungstenite) are
/// classified by their root cause.
pub fn classify(err: &(dyn StdError + 'static)) -> TransportError {
    if chain_is_closure(err) {
        TransportError::Closed(err.to_string())
    } else {
        TransportError::Transient(err.to_string())
    }
}

fn chain_is_closure(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(ws) = e.downcast_ref::<tungstenite::Error>() {
            if is_closure(ws) {
                return true;
            }
        }
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if is_io_closure(io_err) {
                return true;
            }
            // io::Error::source skips the wrapped error itself.
            if let Some(inner) = io_err.get_ref() {
                if chain_is_closure(inner) {
                    return true;
                }
            }
        }
        current = e.source();
    }
    false
}

fn is_closure(err: &tungstenite::Error) -> bool {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => true,
        tungstenite::Error::Protocol(
            ProtocolError::ResetWithoutClosingHandshake | ProtocolError::SendAfterClosing,
        ) => true,
        tungstenite::Error::Io(io_err) => is_io_closure(io_err),
        _ => false,
    }
}

fn is_io_closure(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::NotConnected
    )
}

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl WsTransport {
    /// Performs the WebSocket handshake against `url`.
    pub async fn connect(url: &Url) -> Result<Self, tungstenite::Error> {
        let (stream, response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        debug!(status = %response.status(), %url, "websocket handshake complete");
        Ok(Self {
            stream,
            closed: false,
        })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| classify(&e))
    }

    async fn recv_text(&mut self) -> Result<String, TransportError> {
        loop {
            let Some(incoming) = self.stream.next().await else {
                return Err(TransportError::Closed("stream ended".to_string()));
            };
            match incoming.map_err(|e| classify(&e))? {
                Message::Text(text) => return Ok(text.as_str().to_owned()),
                Message::Close(frame) => {
                    let reason = frame
                        .map(|f| f.reason.as_str().to_owned())
                        .unwrap_or_default();
                    return Err(TransportError::Closed(reason));
                }
                Message::Binary(_) => {
                    return Err(TransportError::Transient(
                        "unexpected binary frame".to_string(),
                    ));
                }
                // Pings are answered by tungstenite on the next write.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.stream.close(None).await {
            debug!(error = %err, "websocket close error");
        }
    }
}
