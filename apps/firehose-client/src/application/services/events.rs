//! Client Events
//!
//! Lifecycle notifications a caller can observe without touching the run
//! loop. Delivery is best-effort: a full channel drops the event.

use std::time::Duration;

/// Events emitted by a reconnecting stream client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A connection attempt is starting.
    Connecting {
        /// Consecutive attempt number (1 for the first try after a success).
        attempt: u32,
    },
    /// Transport connected and subscribe frames were sent.
    Connected,
    /// No data arrived within the receive window; a probe follows.
    StallDetected {
        /// Receive window that elapsed.
        idle: Duration,
    },
    /// The connection failed or was lost.
    Disconnected {
        /// Why the connection ended.
        reason: String,
    },
    /// Waiting before the next connection attempt.
    Reconnecting {
        /// Consecutive failures so far.
        attempt: u32,
        /// Delay being waited.
        delay: Duration,
    },
    /// A payload failed to decode and was dropped.
    MalformedMessage {
        /// Decoder error.
        error: String,
    },
    /// The reconnect budget is spent; the loop is exiting.
    GaveUp {
        /// Total consecutive connection attempts made.
        attempts: u32,
    },
    /// The loop exited after `stop()`.
    Stopped,
}

/// How a call to `start()` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// `stop()` was requested and the loop exited cooperatively.
    Stopped,
    /// `max_reconnect_attempts` was exceeded.
    RetriesExhausted {
        /// Total consecutive connection attempts made.
        attempts: u32,
    },
    /// Another `start()` was already driving this client; nothing was done.
    AlreadyRunning,
}
