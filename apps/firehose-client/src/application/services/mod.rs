//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `ReconnectingStreamClient`: connect/receive/reconnect run loop
//! - `ClientStatus`: live status shared with health checks
//! - `StreamEvent`: lifecycle notifications for observers

mod events;
mod status;
mod stream_client;

pub use events::{RunOutcome, StreamEvent};
pub use status::{ClientStatus, ClientStatusSnapshot};
pub use stream_client::{ReconnectingStreamClient, StopHandle};
