//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports, plus the process-level
//! concerns (configuration, telemetry, metrics, health) the binary wires up.

/// JSON payload decoding.
pub mod codec;

/// Environment configuration.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;

/// WebSocket transport adapter.
pub mod websocket;
