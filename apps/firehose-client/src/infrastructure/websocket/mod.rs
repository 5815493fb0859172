//! WebSocket Transport
//!
//! `StreamTransport` adapter over `tokio-tungstenite`.
//!
//! # Frames
//!
//! - Text and Binary frames are payloads, returned in arrival order.
//! - Ping frames are answered by tungstenite, which queues the Pong itself.
//! - A liveness probe sends a Ping carrying a sequence number and waits for
//!   the matching Pong. Any data frame arriving meanwhile also proves the
//!   peer is alive; it is buffered and returned by the next `receive`.
//! - A Close frame or end of stream ends the connection.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{StreamConnection, StreamTransport, TransportError};

/// Bound on sending our Close frame when a connection is released.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Stand-in deadline for timeouts too large to add to the current instant.
const UNREACHABLE_DEADLINE: Duration = Duration::from_secs(86_400 * 365 * 30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Transport
// =============================================================================

/// Opens WebSocket connections (`ws://` or `wss://`).
#[derive(Clone, Default)]
pub struct WebSocketTransport {
    headers: Vec<(String, String)>,
}

impl WebSocketTransport {
    /// Create a transport with no extra handshake headers.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    /// Add a header to every handshake request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add `Authorization: Bearer <token>` to every handshake request.
    #[must_use]
    pub fn with_bearer_token(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {token}"))
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.headers.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("WebSocketTransport")
            .field("headers", &names)
            .finish()
    }
}

#[async_trait]
impl StreamTransport for WebSocketTransport {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn StreamConnection>, TransportError> {
        let mut request = endpoint
            .into_client_request()
            .map_err(|e| TransportError::ConnectFailed(format!("invalid endpoint: {e}")))?;

        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::ConnectFailed(format!("invalid header name: {e}")))?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                TransportError::ConnectFailed(format!("invalid header value: {e}"))
            })?;
            request.headers_mut().insert(name, value);
        }

        let (stream, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        tracing::debug!(status = %response.status(), "WebSocket handshake complete");

        Ok(Box::new(WebSocketConnection::new(stream)))
    }
}

// =============================================================================
// Connection
// =============================================================================

/// One open WebSocket.
pub struct WebSocketConnection {
    stream: WsStream,
    pending: VecDeque<Bytes>,
    probe_seq: u64,
}

impl WebSocketConnection {
    const fn new(stream: WsStream) -> Self {
        Self {
            stream,
            pending: VecDeque::new(),
            probe_seq: 0,
        }
    }

    /// Read the next frame before `deadline`. `Ok(None)` means the deadline passed.
    async fn next_frame(&mut self, deadline: Instant) -> Result<Option<Message>, TransportError> {
        match tokio::time::timeout_at(deadline, self.stream.next()).await {
            Err(_) => Ok(None),
            Ok(None) => Err(TransportError::Closed),
            Ok(Some(Err(e))) => Err(map_ws_error(e)),
            Ok(Some(Ok(frame))) => Ok(Some(frame)),
        }
    }
}

#[async_trait]
impl StreamConnection for WebSocketConnection {
    async fn receive(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
        if let Some(payload) = self.pending.pop_front() {
            return Ok(payload);
        }

        let deadline = deadline_after(timeout);
        loop {
            let Some(frame) = self.next_frame(deadline).await? else {
                return Err(TransportError::Timeout(timeout));
            };

            match frame {
                Message::Text(text) => return Ok(Bytes::copy_from_slice(text.as_bytes())),
                Message::Binary(data) => return Ok(data),
                Message::Close(frame) => {
                    tracing::info!(?frame, "Server sent close frame");
                    return Err(TransportError::Closed);
                }
                // Ping replies are queued by tungstenite; stale Pongs carry no data.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn ping(&mut self, timeout: Duration) -> Result<(), TransportError> {
        self.probe_seq = self.probe_seq.wrapping_add(1);
        let token = Bytes::copy_from_slice(&self.probe_seq.to_be_bytes());
        let deadline = deadline_after(timeout);

        match tokio::time::timeout_at(deadline, self.stream.send(Message::Ping(token.clone())))
            .await
        {
            Err(_) => {
                return Err(TransportError::ProbeFailed(format!(
                    "ping not sent within {timeout:?}"
                )));
            }
            Ok(Err(e)) => return Err(map_ws_error(e)),
            Ok(Ok(())) => {}
        }

        loop {
            let Some(frame) = self.next_frame(deadline).await? else {
                return Err(TransportError::ProbeFailed(format!(
                    "no pong within {timeout:?}"
                )));
            };

            match frame {
                Message::Pong(data) if data == token => return Ok(()),
                Message::Text(text) => {
                    self.pending.push_back(Bytes::copy_from_slice(text.as_bytes()));
                    return Ok(());
                }
                Message::Binary(data) => {
                    self.pending.push_back(data);
                    return Ok(());
                }
                Message::Close(_) => return Err(TransportError::Closed),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.to_owned().into()))
            .await
            .map_err(map_ws_error)
    }

    async fn close(&mut self) {
        match tokio::time::timeout(CLOSE_TIMEOUT, self.stream.close(None)).await {
            Ok(Ok(())) => tracing::debug!("WebSocket closed"),
            Ok(Err(e)) => tracing::debug!(error = %e, "WebSocket close failed"),
            Err(_) => tracing::debug!("WebSocket close timed out"),
        }
    }
}

/// `timeout` from now, saturating at a deadline that never fires in practice.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + UNREACHABLE_DEADLINE)
}

fn map_ws_error(error: WsError) -> TransportError {
    match error {
        WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
        other => TransportError::Io(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_errors_map_to_closed() {
        assert!(matches!(
            map_ws_error(WsError::ConnectionClosed),
            TransportError::Closed
        ));
        assert!(matches!(
            map_ws_error(WsError::AlreadyClosed),
            TransportError::Closed
        ));
    }

    #[test]
    fn other_errors_map_to_io() {
        let err = map_ws_error(WsError::Io(std::io::Error::other("reset")));
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[test]
    fn debug_hides_header_values() {
        let transport = WebSocketTransport::new().with_bearer_token("secret-token");
        let debug = format!("{transport:?}");
        assert!(debug.contains("Authorization"));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn deadline_saturates_for_oversized_timeouts() {
        let before = Instant::now();
        assert!(deadline_after(Duration::MAX) >= before + UNREACHABLE_DEADLINE);
        assert!(deadline_after(Duration::from_secs(1)) <= Instant::now() + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn invalid_endpoint_fails_to_connect() {
        let transport = WebSocketTransport::new();
        let result = transport.connect("not a url").await;
        assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
    }
}
