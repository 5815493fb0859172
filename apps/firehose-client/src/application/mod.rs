//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the stream client service and the port interfaces
//! that define how it talks to transports, decoders and handlers.

/// Port interfaces for external systems (transport, decoder, handler).
pub mod ports;

/// Application services: the reconnecting client and its status.
pub mod services;
