//! Domain Layer - Connection lifecycle types and backoff logic.
//!
//! This layer holds the pure state of a streaming subscription: its
//! configuration, its lifecycle phase and its reconnect backoff. Nothing
//! here performs I/O.

/// Client configuration, lifecycle phase and reconnect backoff state.
pub mod connection;
