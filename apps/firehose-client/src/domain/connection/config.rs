//! Client Configuration
//!
//! Immutable settings supplied when a client is constructed. There is no
//! dynamic reconfiguration: a client built from a config keeps it for life.

use std::time::Duration;

use super::backoff::BackoffConfig;

/// Default window without data before a connection is probed.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on a single liveness probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on a single connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay before the first reconnect.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Default ceiling for the reconnect delay.
pub const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Configuration for one reconnecting stream client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Label used in log spans and metrics.
    pub name: String,
    /// Connection target (e.g. `wss://host/path`).
    pub endpoint: String,
    /// No message within this window means the connection may be stalled.
    pub receive_timeout: Duration,
    /// Bound on the liveness probe issued after a receive timeout.
    pub probe_timeout: Duration,
    /// Bound on a single connection attempt.
    pub connect_timeout: Duration,
    /// Delay before the first reconnect after a failure.
    pub initial_reconnect_delay: Duration,
    /// Ceiling for the reconnect delay.
    pub max_reconnect_delay: Duration,
    /// Growth factor applied to the delay after every wait.
    pub backoff_multiplier: f64,
    /// Randomization of each wait as a fraction (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Reconnect attempts allowed after the initial failure (`None` = unbounded).
    pub max_reconnect_attempts: Option<u32>,
    /// Text frames sent after every successful connect.
    pub subscribe_messages: Vec<String>,
}

impl ClientConfig {
    /// Create a configuration for `endpoint` with default timings.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            name: "firehose".to_string(),
            endpoint: endpoint.into(),
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            initial_reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_delay: DEFAULT_MAX_RECONNECT_DELAY,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
            max_reconnect_attempts: None,
            subscribe_messages: Vec::new(),
        }
    }

    /// Set the client label.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the receive window.
    #[must_use]
    pub const fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Set the liveness probe bound.
    #[must_use]
    pub const fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the connection attempt bound.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the initial and maximum reconnect delays.
    #[must_use]
    pub const fn with_reconnect_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_reconnect_delay = initial;
        self.max_reconnect_delay = max;
        self
    }

    /// Cap the number of reconnect attempts.
    #[must_use]
    pub const fn with_max_reconnect_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the jitter fraction applied to every wait.
    #[must_use]
    pub const fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    /// Add a text frame to send after every connect.
    #[must_use]
    pub fn with_subscribe_message(mut self, message: impl Into<String>) -> Self {
        self.subscribe_messages.push(message.into());
        self
    }

    /// Backoff parameters derived from this configuration.
    #[must_use]
    pub const fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            initial_delay: self.initial_reconnect_delay,
            max_delay: self.max_reconnect_delay,
            multiplier: self.backoff_multiplier,
            jitter_factor: self.jitter_factor,
            max_attempts: self.max_reconnect_attempts,
        }
    }

    /// Check the configuration for values the run loop cannot honor.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::invalid("endpoint", "must not be empty"));
        }
        if self.receive_timeout.is_zero() {
            return Err(ConfigError::invalid("receive_timeout", "must be non-zero"));
        }
        if self.probe_timeout.is_zero() {
            return Err(ConfigError::invalid("probe_timeout", "must be non-zero"));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::invalid("connect_timeout", "must be non-zero"));
        }
        if self.initial_reconnect_delay.is_zero() {
            return Err(ConfigError::invalid(
                "initial_reconnect_delay",
                "must be non-zero",
            ));
        }
        if self.initial_reconnect_delay > self.max_reconnect_delay {
            return Err(ConfigError::invalid(
                "max_reconnect_delay",
                "must be at least initial_reconnect_delay",
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "backoff_multiplier",
                "must be a finite value >= 1.0",
            ));
        }
        if !(0.0..1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::invalid("jitter_factor", "must be in [0, 1)"));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A field holds a value the client cannot run with.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

impl ConfigError {
    const fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::Invalid { field, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: ConfigError) -> &'static str {
        let ConfigError::Invalid { field, .. } = err;
        field
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::new("wss://example.test/feed");
        assert_eq!(config.receive_timeout, Duration::from_secs(30));
        assert_eq!(config.initial_reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(60));
        assert_eq!(config.max_reconnect_attempts, None);
        assert!((config.backoff_multiplier - 2.0).abs() < f64::EPSILON);
        assert!(config.subscribe_messages.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_endpoint() {
        let err = ClientConfig::new("  ").validate().unwrap_err();
        assert_eq!(field_of(err), "endpoint");
    }

    #[test]
    fn rejects_zero_timeouts() {
        let config = ClientConfig::new("ws://x").with_receive_timeout(Duration::ZERO);
        assert_eq!(field_of(config.validate().unwrap_err()), "receive_timeout");

        let config = ClientConfig::new("ws://x").with_probe_timeout(Duration::ZERO);
        assert_eq!(field_of(config.validate().unwrap_err()), "probe_timeout");

        let config = ClientConfig::new("ws://x").with_connect_timeout(Duration::ZERO);
        assert_eq!(field_of(config.validate().unwrap_err()), "connect_timeout");
    }

    #[test]
    fn rejects_inverted_delays() {
        let config = ClientConfig::new("ws://x")
            .with_reconnect_delays(Duration::from_secs(10), Duration::from_secs(1));
        assert_eq!(
            field_of(config.validate().unwrap_err()),
            "max_reconnect_delay"
        );
    }

    #[test]
    fn rejects_shrinking_multiplier() {
        let mut config = ClientConfig::new("ws://x");
        config.backoff_multiplier = 0.5;
        assert_eq!(
            field_of(config.validate().unwrap_err()),
            "backoff_multiplier"
        );
    }

    #[test]
    fn rejects_out_of_range_jitter() {
        let config = ClientConfig::new("ws://x").with_jitter(1.5);
        assert_eq!(field_of(config.validate().unwrap_err()), "jitter_factor");
    }

    #[test]
    fn backoff_mirrors_fields() {
        let config = ClientConfig::new("ws://x")
            .with_reconnect_delays(Duration::from_secs(1), Duration::from_secs(10))
            .with_max_reconnect_attempts(Some(2));
        let backoff = config.backoff();
        assert_eq!(backoff.initial_delay, Duration::from_secs(1));
        assert_eq!(backoff.max_delay, Duration::from_secs(10));
        assert_eq!(backoff.max_attempts, Some(2));
    }
}
