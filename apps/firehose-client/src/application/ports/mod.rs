//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `StreamTransport` / `StreamConnection`: a persistent, message-framed
//!   connection that can be probed for liveness
//! - `MessageDecoder`: turns a raw payload into a structured message
//! - `ClientMetrics`: sink for lifecycle counters and the connected gauge
//!
//! ## Driver Ports (Inbound)
//!
//! - `MessageHandler`: caller callback receiving decoded messages

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::connection::ClientPhase;

// =============================================================================
// Transport
// =============================================================================

/// Errors reported by a transport or one of its connections.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection could not be established (refused, DNS, handshake).
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// The operation did not finish within its bound.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The peer closed the connection or the stream ended.
    #[error("connection closed")]
    Closed,

    /// The liveness probe was not acknowledged.
    #[error("liveness probe failed: {0}")]
    ProbeFailed(String),

    /// Any other I/O or protocol failure on an open connection.
    #[error("transport error: {0}")]
    Io(String),
}

impl TransportError {
    /// Whether this error is a receive/probe timeout rather than a failure.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Factory for connections to a streaming endpoint.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open a fresh connection to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectFailed` when the endpoint cannot be reached.
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn StreamConnection>, TransportError>;
}

/// One open connection. Dropped (after `close`) when it fails or stalls.
#[async_trait]
pub trait StreamConnection: Send {
    /// Wait up to `timeout` for the next payload.
    ///
    /// # Errors
    ///
    /// `Timeout` if nothing arrived, `Closed` if the peer went away, `Io` otherwise.
    async fn receive(&mut self, timeout: Duration) -> Result<Bytes, TransportError>;

    /// Send a liveness probe and wait up to `timeout` for the acknowledgement.
    ///
    /// # Errors
    ///
    /// Any error means the connection should be treated as dead.
    async fn ping(&mut self, timeout: Duration) -> Result<(), TransportError>;

    /// Send a text frame (subscription requests and similar).
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be written.
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Release the connection. Errors while closing are ignored.
    async fn close(&mut self);
}

// =============================================================================
// Decoding
// =============================================================================

/// Errors produced while decoding a single payload.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Payload is not valid UTF-8.
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Payload is not a valid JSON document of the expected shape.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Turns raw payloads into structured messages.
pub trait MessageDecoder: Send + Sync {
    /// Decoded message type delivered to the handler.
    type Message: Send;

    /// Decode one payload.
    ///
    /// # Errors
    ///
    /// Returns `CodecError` if the payload is malformed.
    fn decode(&self, payload: &[u8]) -> Result<Self::Message, CodecError>;
}

// =============================================================================
// Metrics
// =============================================================================

/// Sink for client lifecycle metrics. Every method defaults to a no-op.
pub trait ClientMetrics: Send + Sync {
    /// A connection attempt started.
    fn connect_attempt(&self) {}

    /// A reconnect wait started after a failure.
    fn reconnect(&self) {}

    /// The run ended because the reconnect budget was spent.
    fn give_up(&self) {}

    /// A receive window elapsed without data.
    fn stall(&self) {}

    /// A stalled connection did not answer the liveness check.
    fn liveness_failure(&self) {}

    /// A message was decoded and delivered.
    fn message(&self) {}

    /// A payload failed to decode and was dropped.
    fn malformed(&self) {}

    /// The client moved to `phase`.
    fn phase(&self, _phase: ClientPhase) {}
}

/// Metrics sink that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl ClientMetrics for NoopMetrics {}

// =============================================================================
// Handler
// =============================================================================

/// Receives decoded messages in arrival order, one at a time.
pub trait MessageHandler<M>: Send {
    /// Handle one message.
    fn on_message(&mut self, message: M);
}

impl<M, F> MessageHandler<M> for F
where
    F: FnMut(M) + Send,
{
    fn on_message(&mut self, message: M) {
        self(message);
    }
}
