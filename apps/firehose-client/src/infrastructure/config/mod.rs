//! Configuration Module
//!
//! Environment-driven configuration for the `firehose-tail` binary.

mod settings;

pub use settings::{AuthToken, ClientSettings, DEFAULT_HEALTH_PORT, ServerSettings, SettingsError};
