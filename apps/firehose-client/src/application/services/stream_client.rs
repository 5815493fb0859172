//! Reconnecting Stream Client
//!
//! Owns the connect/receive/reconnect lifecycle of one streaming
//! subscription and hands every decoded message to a caller handler.
//!
//! Manages:
//! - Bounded connection attempts
//! - Stall detection with a liveness probe
//! - Dropping malformed payloads without touching the connection
//! - Exponential backoff with an optional attempt budget
//! - Cooperative shutdown through `stop()` / `StopHandle`
//!
//! All transport failures are handled inside the loop. `start()` only
//! returns when `stop()` was called or the reconnect budget is spent.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tracing::Instrument;

use super::events::{RunOutcome, StreamEvent};
use super::status::ClientStatus;
use crate::application::ports::{
    ClientMetrics, MessageDecoder, MessageHandler, NoopMetrics, StreamConnection, StreamTransport,
    TransportError,
};
use crate::domain::connection::{ClientConfig, ClientPhase, ConfigError, ConnectionState};

/// Longest raw-payload excerpt written to logs for a malformed message.
const PAYLOAD_LOG_LIMIT: usize = 256;

/// How often `StopHandle::stop_until_finished` repeats its stop request.
const STOP_RETRY_INTERVAL: Duration = Duration::from_millis(50);

// =============================================================================
// Run Control
// =============================================================================

/// The only state shared with other tasks: the running flag and a waker
/// for the backoff sleep.
#[derive(Debug, Default)]
struct RunControl {
    running: AtomicBool,
    wake: Notify,
}

impl RunControl {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_waiters();
    }
}

/// Cloneable handle that stops a client from any task or thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    control: Arc<RunControl>,
}

impl StopHandle {
    /// Request a cooperative stop.
    ///
    /// Backoff waits end immediately; an in-flight receive finishes first.
    pub fn stop(&self) {
        self.control.stop();
    }

    /// Whether the client's loop is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Stop the client and wait up to `limit` for `run` to finish.
    ///
    /// `start()` arms the running flag when it is first polled, so a stop
    /// issued before that is overwritten. The request is repeated every
    /// `STOP_RETRY_INTERVAL` until `run` completes. Returns `None` if
    /// `limit` elapsed first; `run` is left untouched in that case.
    pub async fn stop_until_finished<F>(&self, run: &mut F, limit: Duration) -> Option<F::Output>
    where
        F: Future + Unpin,
    {
        let repeat = async {
            loop {
                self.stop();
                tokio::select! {
                    output = &mut *run => return output,
                    () = tokio::time::sleep(STOP_RETRY_INTERVAL) => {}
                }
            }
        };
        tokio::time::timeout(limit, repeat).await.ok()
    }
}

/// Why a single connection ended.
enum SessionEnd {
    Stopped,
    Failed(TransportError),
}

// =============================================================================
// Client
// =============================================================================

/// Long-lived subscription to a streaming endpoint.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use firehose_client::{ClientConfig, JsonCodec, ReconnectingStreamClient, WebSocketTransport};
///
/// async fn example() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ClientConfig::new("wss://stream.example.test/feed");
///     let client = Arc::new(ReconnectingStreamClient::new(
///         config,
///         WebSocketTransport::new(),
///         JsonCodec::<serde_json::Value>::new(),
///         |message: serde_json::Value| println!("{message}"),
///     )?);
///
///     let stop = client.stop_handle();
///     tokio::spawn(async move {
///         tokio::signal::ctrl_c().await.ok();
///         stop.stop();
///     });
///
///     client.start().await;
///     Ok(())
/// }
/// ```
pub struct ReconnectingStreamClient<T, D, H>
where
    T: StreamTransport,
    D: MessageDecoder,
    H: MessageHandler<D::Message>,
{
    config: ClientConfig,
    transport: T,
    decoder: D,
    handler: Mutex<H>,
    state: Mutex<ConnectionState>,
    control: Arc<RunControl>,
    status: Arc<ClientStatus>,
    metrics: Arc<dyn ClientMetrics>,
    event_tx: Option<mpsc::Sender<StreamEvent>>,
    span: tracing::Span,
}

impl<T, D, H> ReconnectingStreamClient<T, D, H>
where
    T: StreamTransport,
    D: MessageDecoder,
    H: MessageHandler<D::Message>,
{
    /// Create a client. The configuration is validated here so a bad
    /// setting fails before any connection is attempted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` fails validation.
    pub fn new(
        config: ClientConfig,
        transport: T,
        decoder: D,
        handler: H,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let span = tracing::info_span!(
            "stream_client",
            name = %config.name,
            endpoint = %config.endpoint,
            client_id = %uuid::Uuid::new_v4(),
        );

        Ok(Self {
            state: Mutex::new(ConnectionState::new(config.backoff())),
            status: Arc::new(ClientStatus::new(&config.name, &config.endpoint)),
            config,
            transport,
            decoder,
            handler: Mutex::new(handler),
            control: Arc::new(RunControl::default()),
            metrics: Arc::new(NoopMetrics),
            event_tx: None,
            span,
        })
    }

    /// Forward lifecycle events to `event_tx`.
    #[must_use]
    pub fn with_events(mut self, event_tx: mpsc::Sender<StreamEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Record lifecycle metrics into `metrics`. Nothing is recorded by default.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn ClientMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Emit all log records for this client under `span` instead of the
    /// default `stream_client` span.
    #[must_use]
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Shared status for health checks.
    #[must_use]
    pub fn status(&self) -> Arc<ClientStatus> {
        Arc::clone(&self.status)
    }

    /// Handle that can stop this client from elsewhere.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            control: Arc::clone(&self.control),
        }
    }

    /// Whether the run loop is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Delay the next failure will wait.
    #[must_use]
    pub fn current_backoff(&self) -> Duration {
        self.state.lock().current_backoff()
    }

    /// Consecutive failures since the last successful connection.
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.state.lock().attempt_count()
    }

    /// Request a cooperative stop. See [`StopHandle::stop`].
    pub fn stop(&self) {
        self.control.stop();
    }

    /// Run the connect/receive/reconnect loop until stopped or the
    /// reconnect budget is spent.
    ///
    /// Calling this while another call is running logs a warning and
    /// returns `RunOutcome::AlreadyRunning` without starting a second loop.
    pub async fn start(&self) -> RunOutcome {
        if self
            .control
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(parent: &self.span, "Stream client already running, ignoring start");
            return RunOutcome::AlreadyRunning;
        }

        self.state.lock().reset();
        let outcome = self.run().instrument(self.span.clone()).await;

        self.control.running.store(false, Ordering::SeqCst);
        self.set_phase(ClientPhase::Stopped);
        outcome
    }

    async fn run(&self) -> RunOutcome {
        tracing::info!("Stream client started");

        loop {
            if !self.is_running() {
                return self.stopped();
            }

            // CONNECTING
            self.set_phase(ClientPhase::Connecting);
            let attempt = self.state.lock().attempt_count() + 1;
            self.status.record_connect_attempt();
            self.metrics.connect_attempt();
            self.emit(StreamEvent::Connecting { attempt });
            tracing::info!(attempt, "Connecting to stream");

            let end = match self.connect().await {
                Ok(mut connection) => {
                    let end = self.run_session(connection.as_mut()).await;
                    connection.close().await;
                    end
                }
                Err(e) => SessionEnd::Failed(e),
            };

            let error = match end {
                SessionEnd::Stopped => return self.stopped(),
                SessionEnd::Failed(e) => e,
            };

            // BACKOFF
            self.set_phase(ClientPhase::Backoff);
            let (delay, failures) = {
                let mut state = self.state.lock();
                let delay = state.on_failure();
                (delay, state.attempt_count())
            };

            tracing::warn!(error = %error, failures, "Stream connection failed");
            self.status.record_failure(error.to_string(), failures);
            self.emit(StreamEvent::Disconnected {
                reason: error.to_string(),
            });

            if !self.is_running() {
                return self.stopped();
            }

            let Some(delay) = delay else {
                tracing::error!(
                    attempts = failures,
                    "Giving up on stream after exhausting reconnect attempts"
                );
                self.metrics.give_up();
                self.emit(StreamEvent::GaveUp { attempts: failures });
                return RunOutcome::RetriesExhausted { attempts: failures };
            };

            tracing::info!(
                attempt = failures,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconnecting to stream"
            );
            self.status.record_reconnect();
            self.metrics.reconnect();
            self.emit(StreamEvent::Reconnecting {
                attempt: failures,
                delay,
            });

            if !self.sleep_unless_stopped(delay).await {
                return self.stopped();
            }
        }
    }

    async fn connect(&self) -> Result<Box<dyn StreamConnection>, TransportError> {
        bounded(
            self.config.connect_timeout,
            self.transport.connect(&self.config.endpoint),
        )
        .await
    }

    /// Drive one open connection until it fails or a stop is observed.
    async fn run_session(&self, connection: &mut dyn StreamConnection) -> SessionEnd {
        // CONNECTED
        self.state.lock().on_connected();
        self.status.record_connected();
        self.metrics.phase(ClientPhase::Connected);

        for message in &self.config.subscribe_messages {
            if let Err(e) = connection.send_text(message).await {
                return SessionEnd::Failed(e);
            }
        }

        tracing::info!(
            subscriptions = self.config.subscribe_messages.len(),
            "Connected to stream"
        );
        self.emit(StreamEvent::Connected);

        // RECEIVING
        self.set_phase(ClientPhase::Receiving);
        loop {
            if !self.is_running() {
                return SessionEnd::Stopped;
            }

            let timeout = self.config.receive_timeout;
            match bounded(timeout, connection.receive(timeout)).await {
                Ok(payload) => self.deliver(&payload),
                Err(e) if e.is_timeout() => {
                    if !self.is_running() {
                        return SessionEnd::Stopped;
                    }
                    if let Err(e) = self.probe(connection).await {
                        return SessionEnd::Failed(e);
                    }
                }
                Err(e) => return SessionEnd::Failed(e),
            }
        }
    }

    /// STALL_CHECK: a receive window elapsed, ask the peer if it is alive.
    async fn probe(&self, connection: &mut dyn StreamConnection) -> Result<(), TransportError> {
        self.set_phase(ClientPhase::StallCheck);
        self.status.record_stall();
        self.metrics.stall();
        self.emit(StreamEvent::StallDetected {
            idle: self.config.receive_timeout,
        });
        tracing::warn!(
            idle_secs = self.config.receive_timeout.as_secs_f64(),
            "No data within receive timeout, probing connection"
        );

        let timeout = self.config.probe_timeout;
        match bounded(timeout, connection.ping(timeout)).await {
            Ok(()) => {
                tracing::debug!("Liveness probe acknowledged");
                self.set_phase(ClientPhase::Receiving);
                Ok(())
            }
            Err(e) => {
                self.metrics.liveness_failure();
                tracing::warn!(error = %e, "Liveness probe failed, treating connection as dead");
                Err(match e {
                    TransportError::ProbeFailed(_) => e,
                    other => TransportError::ProbeFailed(other.to_string()),
                })
            }
        }
    }

    /// Decode and hand off one payload. Malformed payloads are dropped.
    fn deliver(&self, payload: &[u8]) {
        match self.decoder.decode(payload) {
            Ok(message) => {
                self.status.record_message();
                self.metrics.message();
                self.handler.lock().on_message(message);
            }
            Err(e) => {
                self.status.record_malformed();
                self.metrics.malformed();
                tracing::warn!(
                    error = %e,
                    payload = %payload_excerpt(payload),
                    "Discarding malformed message"
                );
                self.emit(StreamEvent::MalformedMessage {
                    error: e.to_string(),
                });
            }
        }
    }

    /// Wait out `delay`. Returns `false` if a stop arrived first.
    async fn sleep_unless_stopped(&self, delay: Duration) -> bool {
        let notified = self.control.wake.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent stop() is not missed.
        notified.as_mut().enable();

        if !self.is_running() {
            return false;
        }

        tokio::select! {
            () = &mut notified => false,
            () = tokio::time::sleep(delay) => self.is_running(),
        }
    }

    fn stopped(&self) -> RunOutcome {
        tracing::info!("Stream client stopped");
        self.emit(StreamEvent::Stopped);
        RunOutcome::Stopped
    }

    fn set_phase(&self, phase: ClientPhase) {
        self.status.set_phase(phase);
        self.metrics.phase(phase);
    }

    fn emit(&self, event: StreamEvent) {
        if let Some(tx) = &self.event_tx
            && let Err(mpsc::error::TrySendError::Full(event)) = tx.try_send(event)
        {
            tracing::debug!(?event, "Event channel full, dropping event");
        }
    }
}

/// Bound `operation` by `timeout`, mapping expiry to `TransportError::Timeout`.
async fn bounded<F, R>(timeout: Duration, operation: F) -> Result<R, TransportError>
where
    F: Future<Output = Result<R, TransportError>>,
{
    tokio::time::timeout(timeout, operation)
        .await
        .unwrap_or(Err(TransportError::Timeout(timeout)))
}

fn payload_excerpt(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    if text.chars().count() <= PAYLOAD_LOG_LIMIT {
        return text.into_owned();
    }
    let mut excerpt: String = text.chars().take(PAYLOAD_LOG_LIMIT).collect();
    excerpt.push('…');
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_short_payload_unchanged() {
        assert_eq!(payload_excerpt(b"{\"a\":1"), "{\"a\":1");
    }

    #[test]
    fn excerpt_truncates_long_payload() {
        let payload = vec![b'x'; PAYLOAD_LOG_LIMIT * 2];
        let excerpt = payload_excerpt(&payload);
        assert_eq!(excerpt.chars().count(), PAYLOAD_LOG_LIMIT + 1);
        assert!(excerpt.ends_with('…'));
    }

    #[test]
    fn excerpt_replaces_invalid_utf8() {
        assert_eq!(payload_excerpt(&[0xff, b'a']), "\u{fffd}a");
    }

    #[tokio::test]
    async fn bounded_maps_elapsed_to_timeout() {
        let result: Result<(), TransportError> =
            bounded(Duration::from_millis(10), std::future::pending()).await;
        assert!(matches!(result, Err(TransportError::Timeout(_))));
    }

    #[tokio::test]
    async fn bounded_passes_through_result() {
        let result = bounded(Duration::from_secs(1), async { Ok::<_, TransportError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn stop_handle_clears_flag() {
        let control = Arc::new(RunControl::default());
        control.running.store(true, Ordering::SeqCst);
        let handle = StopHandle {
            control: Arc::clone(&control),
        };

        assert!(handle.is_running());
        handle.stop();
        assert!(!handle.is_running());
    }

    #[test]
    fn stop_wakes_registered_waiter() {
        let control = RunControl::default();
        let mut waiter = tokio_test::task::spawn(control.wake.notified());

        tokio_test::assert_pending!(waiter.poll());
        control.stop();

        assert!(waiter.is_woken());
        tokio_test::assert_ready!(waiter.poll());
    }
}
