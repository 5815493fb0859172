//! Connection Lifecycle Types
//!
//! Domain types for one streaming subscription: the immutable client
//! configuration, the lifecycle phase, and the mutable backoff state that
//! the run loop owns.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected ─► Connecting ─► Connected ─► Receiving ⇄ StallCheck
//!                     ▲                          │
//!                     └──────── Backoff ◄────────┘
//!                                  │
//!                                  ▼
//!                               Stopped
//! ```

mod backoff;
mod config;

pub use backoff::{BackoffConfig, ConnectionState};
pub use config::{
    ClientConfig, ConfigError, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_RECONNECT_DELAY,
    DEFAULT_PROBE_TIMEOUT, DEFAULT_RECEIVE_TIMEOUT, DEFAULT_RECONNECT_DELAY,
};

use serde::Serialize;

// =============================================================================
// Client Phase
// =============================================================================

/// Position of a client in its connect/receive/reconnect state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientPhase {
    /// No transport open and no attempt in progress.
    #[default]
    Disconnected,
    /// Transport connection attempt in flight.
    Connecting,
    /// Transport open, subscribe frames being sent.
    Connected,
    /// Waiting for the next message.
    Receiving,
    /// No data within the receive window; liveness probe in flight.
    StallCheck,
    /// Waiting out the reconnect delay.
    Backoff,
    /// Terminal state, the run loop has exited.
    Stopped,
}

impl ClientPhase {
    /// Get the phase name used in logs, metrics and health output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Receiving => "receiving",
            Self::StallCheck => "stall_check",
            Self::Backoff => "backoff",
            Self::Stopped => "stopped",
        }
    }

    /// Whether a transport connection is currently open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Receiving | Self::StallCheck)
    }
}

impl std::fmt::Display for ClientPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
