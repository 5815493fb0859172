#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Firehose Client - Reconnecting Stream Subscriber
//!
//! Keeps a long-lived subscription to a push-based message stream alive.
//! Messages are decoded and handed to a caller-supplied handler; silence is
//! probed before the connection is declared dead, and lost connections are
//! retried with exponential backoff until stopped or out of attempts.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Connection lifecycle types
//!   - `connection`: client configuration, phases, backoff state
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: transport, connection, decoder and handler interfaces
//!   - `services`: the reconnecting client, its status and events
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `websocket`: tokio-tungstenite transport
//!   - `codec`: JSON decoding
//!   - `config`: environment configuration
//!   - `health`, `metrics`, `telemetry`: process observability
//!
//! # Data Flow
//!
//! ```text
//! endpoint ──► StreamTransport ──► receive ──► MessageDecoder ──► MessageHandler
//!                   ▲                 │
//!                   │              timeout
//!                   │                 ▼
//!               backoff ◄── fail ── probe (ping)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Connection lifecycle types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::connection::{BackoffConfig, ClientConfig, ClientPhase, ConfigError};

// Ports
pub use application::ports::{
    ClientMetrics, CodecError, MessageDecoder, MessageHandler, NoopMetrics, StreamConnection,
    StreamTransport, TransportError,
};

// Services
pub use application::services::{
    ClientStatus, ClientStatusSnapshot, ReconnectingStreamClient, RunOutcome, StopHandle,
    StreamEvent,
};

// Adapters
pub use infrastructure::codec::{JsonCodec, JsonObject};
pub use infrastructure::websocket::WebSocketTransport;

// Infrastructure config
pub use infrastructure::config::{AuthToken, ClientSettings, ServerSettings, SettingsError};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::{PrometheusMetrics, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{
    TelemetryConfig, TelemetryError, TelemetryGuard, init as init_telemetry,
};
