//! Prometheus Metrics Module
//!
//! Exposes client lifecycle metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Connections**: connect attempts, reconnect waits, give-ups
//! - **Health**: stall detections, probe failures
//! - **Messages**: delivered and malformed payload counts
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. A client
//! records into Prometheus once it is given a `PrometheusMetrics` sink.
//! Recording is a no-op until `init_metrics` installs a recorder.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::application::ports::ClientMetrics;
use crate::domain::connection::ClientPhase;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first one.
///
/// # Errors
///
/// Returns `BuildError` if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "firehose_client_connect_attempts_total",
        "Total transport connection attempts"
    );
    describe_counter!(
        "firehose_client_reconnects_total",
        "Total reconnect waits started after a failure"
    );
    describe_counter!(
        "firehose_client_give_ups_total",
        "Total runs ended because the reconnect budget was exhausted"
    );
    describe_counter!(
        "firehose_client_stalls_total",
        "Total receive windows that elapsed without data"
    );
    describe_counter!(
        "firehose_client_probe_failures_total",
        "Total liveness probes that failed or timed out"
    );
    describe_counter!(
        "firehose_client_messages_total",
        "Total messages decoded and delivered to the handler"
    );
    describe_counter!(
        "firehose_client_malformed_messages_total",
        "Total payloads dropped because they failed to decode"
    );
    describe_gauge!(
        "firehose_client_connected",
        "1 while the client holds an open connection, 0 otherwise"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a connection attempt.
pub fn record_connect_attempt(client: &str) {
    counter!("firehose_client_connect_attempts_total", "client" => client.to_string())
        .increment(1);
}

/// Record the start of a reconnect wait.
pub fn record_reconnect(client: &str) {
    counter!("firehose_client_reconnects_total", "client" => client.to_string()).increment(1);
}

/// Record a run ending on an exhausted reconnect budget.
pub fn record_give_up(client: &str) {
    counter!("firehose_client_give_ups_total", "client" => client.to_string()).increment(1);
}

/// Record a stall detection.
pub fn record_stall(client: &str) {
    counter!("firehose_client_stalls_total", "client" => client.to_string()).increment(1);
}

/// Record a failed liveness probe.
pub fn record_probe_failure(client: &str) {
    counter!("firehose_client_probe_failures_total", "client" => client.to_string())
        .increment(1);
}

/// Record a delivered message.
pub fn record_message(client: &str) {
    counter!("firehose_client_messages_total", "client" => client.to_string()).increment(1);
}

/// Record a dropped malformed payload.
pub fn record_malformed(client: &str) {
    counter!("firehose_client_malformed_messages_total", "client" => client.to_string())
        .increment(1);
}

/// Update the connected gauge from the client's phase.
pub fn set_phase(client: &str, phase: ClientPhase) {
    gauge!("firehose_client_connected", "client" => client.to_string())
        .set(connected_value(phase));
}

const fn connected_value(phase: ClientPhase) -> f64 {
    if phase.is_connected() { 1.0 } else { 0.0 }
}

// =============================================================================
// Client Sink
// =============================================================================

/// `ClientMetrics` sink labelling every series with the client's name.
#[derive(Debug, Clone)]
pub struct PrometheusMetrics {
    client: String,
}

impl PrometheusMetrics {
    /// Create a sink for the client called `client`.
    #[must_use]
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
        }
    }
}

impl ClientMetrics for PrometheusMetrics {
    fn connect_attempt(&self) {
        record_connect_attempt(&self.client);
    }

    fn reconnect(&self) {
        record_reconnect(&self.client);
    }

    fn give_up(&self) {
        record_give_up(&self.client);
    }

    fn stall(&self) {
        record_stall(&self.client);
    }

    fn liveness_failure(&self) {
        record_probe_failure(&self.client);
    }

    fn message(&self) {
        record_message(&self.client);
    }

    fn malformed(&self) {
        record_malformed(&self.client);
    }

    fn phase(&self, phase: ClientPhase) {
        set_phase(&self.client, phase);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_gauge_values() {
        assert!((connected_value(ClientPhase::Receiving) - 1.0).abs() < f64::EPSILON);
        assert!((connected_value(ClientPhase::StallCheck) - 1.0).abs() < f64::EPSILON);
        assert!(connected_value(ClientPhase::Backoff).abs() < f64::EPSILON);
        assert!(connected_value(ClientPhase::Stopped).abs() < f64::EPSILON);
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        let sink = PrometheusMetrics::new("test");
        sink.connect_attempt();
        sink.message();
        sink.phase(ClientPhase::Receiving);
    }

    #[test]
    fn installed_recorder_sees_client_series() {
        let handle = init_metrics().unwrap();
        let sink = PrometheusMetrics::new("sink-test");
        sink.connect_attempt();
        sink.give_up();
        sink.phase(ClientPhase::Receiving);

        let rendered = handle.render();
        assert!(rendered.contains(r#"firehose_client_connect_attempts_total{client="sink-test"}"#));
        assert!(rendered.contains(r#"firehose_client_give_ups_total{client="sink-test"}"#));
        assert!(rendered.contains(r#"firehose_client_connected{client="sink-test"} 1"#));
    }
}
