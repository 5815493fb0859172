//! Reconnect Backoff State
//!
//! Exponential backoff with optional jitter, plus the attempt counter that
//! bounds how many reconnects a client makes before giving up.

use std::time::Duration;

use rand::Rng;

/// Parameters for reconnect backoff.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first reconnect.
    pub initial_delay: Duration,
    /// Ceiling for the delay.
    pub max_delay: Duration,
    /// Growth factor per wait (2.0 doubles the delay).
    pub multiplier: f64,
    /// Jitter as a fraction (0.1 = ±10%). Zero keeps delays exact.
    pub jitter_factor: f64,
    /// Reconnects allowed after the initial failure (`None` = unlimited).
    pub max_attempts: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts: None,
        }
    }
}

/// Mutable reconnect state owned by a single client run loop.
///
/// # Example
///
/// ```rust
/// use firehose_client::domain::connection::{BackoffConfig, ConnectionState};
/// use std::time::Duration;
///
/// let mut state = ConnectionState::new(BackoffConfig {
///     initial_delay: Duration::from_secs(1),
///     max_delay: Duration::from_secs(10),
///     ..BackoffConfig::default()
/// });
///
/// assert_eq!(state.on_failure(), Some(Duration::from_secs(1)));
/// assert_eq!(state.on_failure(), Some(Duration::from_secs(2)));
///
/// // A successful connection starts the sequence over.
/// state.on_connected();
/// assert_eq!(state.on_failure(), Some(Duration::from_secs(1)));
/// ```
#[derive(Debug)]
pub struct ConnectionState {
    config: BackoffConfig,
    current_backoff: Duration,
    attempt_count: u32,
}

impl ConnectionState {
    /// Create state positioned before any failure.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            current_backoff: initial_delay,
            attempt_count: 0,
        }
    }

    /// Record a failed connection (or a lost one) and get the delay to wait.
    ///
    /// Returns `None` once the attempt budget is spent.
    pub fn on_failure(&mut self) -> Option<Duration> {
        self.attempt_count = self.attempt_count.saturating_add(1);

        if self.is_exhausted() {
            return None;
        }

        let delay = self.apply_jitter(self.current_backoff);
        self.current_backoff = self.grow(self.current_backoff);
        Some(delay)
    }

    /// Reset after a successful connection.
    pub const fn on_connected(&mut self) {
        self.reset();
    }

    /// Return to the initial delay with no failures recorded.
    pub const fn reset(&mut self) {
        self.current_backoff = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Whether the failure count has passed the configured cap.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        match self.config.max_attempts {
            Some(max) => self.attempt_count > max,
            None => false,
        }
    }

    /// Delay the next failure will wait (before jitter).
    #[must_use]
    pub const fn current_backoff(&self) -> Duration {
        self.current_backoff
    }

    /// Consecutive failures since the last successful connection.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    fn grow(&self, delay: Duration) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let scaled = (delay.as_millis() as f64 * self.config.multiplier).round();
        let max_millis = self.config.max_delay.as_millis();
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                scaled as u128
            }
        } else {
            max_millis
        };
        let capped = u64::try_from(next_millis.min(max_millis)).unwrap_or(u64::MAX);
        Duration::from_millis(capped)
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_u64 = adjusted_millis as u64;
        Duration::from_millis(adjusted_u64)
    }
}
