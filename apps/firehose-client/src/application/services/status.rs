//! Client Status
//!
//! Read-only view of a running client for health checks and dashboards.
//! The run loop is the only writer.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::domain::connection::ClientPhase;

/// Live status of one client, shared with observers through an `Arc`.
#[derive(Debug)]
pub struct ClientStatus {
    name: String,
    endpoint: String,
    created_at: Instant,
    phase: RwLock<ClientPhase>,
    last_connected_at: RwLock<Option<DateTime<Utc>>>,
    last_message_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
    consecutive_failures: AtomicU32,
    connect_attempts: AtomicU64,
    reconnects: AtomicU64,
    stalls: AtomicU64,
    messages_delivered: AtomicU64,
    malformed_messages: AtomicU64,
}

impl ClientStatus {
    /// Create status for a client that has not started yet.
    #[must_use]
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            created_at: Instant::now(),
            phase: RwLock::new(ClientPhase::Disconnected),
            last_connected_at: RwLock::new(None),
            last_message_at: RwLock::new(None),
            last_error: RwLock::new(None),
            consecutive_failures: AtomicU32::new(0),
            connect_attempts: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            stalls: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            malformed_messages: AtomicU64::new(0),
        }
    }

    pub(crate) fn set_phase(&self, phase: ClientPhase) {
        *self.phase.write() = phase;
    }

    pub(crate) fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connected(&self) {
        *self.phase.write() = ClientPhase::Connected;
        *self.last_connected_at.write() = Some(Utc::now());
        *self.last_error.write() = None;
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self, error: String, consecutive: u32) {
        *self.last_error.write() = Some(error);
        self.consecutive_failures.store(consecutive, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stall(&self) {
        self.stalls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_message(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
        *self.last_message_at.write() = Some(Utc::now());
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Client label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> ClientPhase {
        *self.phase.read()
    }

    /// Messages decoded and handed to the handler.
    #[must_use]
    pub fn messages_delivered(&self) -> u64 {
        self.messages_delivered.load(Ordering::Relaxed)
    }

    /// Payloads dropped because they failed to decode.
    #[must_use]
    pub fn malformed_messages(&self) -> u64 {
        self.malformed_messages.load(Ordering::Relaxed)
    }

    /// Connection attempts made over the client's lifetime.
    #[must_use]
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    /// Reconnect waits started over the client's lifetime.
    #[must_use]
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Receive windows that elapsed without data.
    #[must_use]
    pub fn stalls(&self) -> u64 {
        self.stalls.load(Ordering::Relaxed)
    }

    /// Point-in-time copy suitable for serialization.
    #[must_use]
    pub fn snapshot(&self) -> ClientStatusSnapshot {
        let phase = self.phase();
        ClientStatusSnapshot {
            name: self.name.clone(),
            endpoint: self.endpoint.clone(),
            phase,
            connected: phase.is_connected(),
            uptime_secs: self.created_at.elapsed().as_secs(),
            last_connected_at: *self.last_connected_at.read(),
            last_message_at: *self.last_message_at.read(),
            last_error: self.last_error.read().clone(),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            connect_attempts: self.connect_attempts(),
            reconnects: self.reconnects(),
            stalls: self.stalls(),
            messages_delivered: self.messages_delivered(),
            malformed_messages: self.malformed_messages(),
        }
    }
}

/// Serializable copy of `ClientStatus`.
#[derive(Debug, Clone, Serialize)]
pub struct ClientStatusSnapshot {
    /// Client label.
    pub name: String,
    /// Connection target.
    pub endpoint: String,
    /// Lifecycle phase.
    pub phase: ClientPhase,
    /// Whether a transport connection is open.
    pub connected: bool,
    /// Seconds since the client was constructed.
    pub uptime_secs: u64,
    /// Time of the last successful connection.
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Time of the last delivered message.
    pub last_message_at: Option<DateTime<Utc>>,
    /// Most recent connection error, cleared on connect.
    pub last_error: Option<String>,
    /// Failures since the last successful connection.
    pub consecutive_failures: u32,
    /// Lifetime connection attempts.
    pub connect_attempts: u64,
    /// Lifetime reconnect waits.
    pub reconnects: u64,
    /// Lifetime stall detections.
    pub stalls: u64,
    /// Lifetime delivered messages.
    pub messages_delivered: u64,
    /// Lifetime dropped payloads.
    pub malformed_messages: u64,
}
