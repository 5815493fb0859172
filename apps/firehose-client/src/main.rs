//! Firehose Tail Binary
//!
//! Subscribes to a JSON message stream and prints each message to stdout,
//! one compact JSON document per line.
//!
//! # Usage
//!
//! ```bash
//! FIREHOSE_ENDPOINT=wss://stream.example.test/subscribe cargo run --bin firehose-tail
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `FIREHOSE_ENDPOINT`: WebSocket URL (`ws://` or `wss://`)
//!
//! ## Optional
//! - `FIREHOSE_NAME`: Client label for logs and metrics (default: firehose)
//! - `FIREHOSE_RECEIVE_TIMEOUT_SECS`: Silence before probing (default: 30)
//! - `FIREHOSE_PROBE_TIMEOUT_SECS`: Ping reply bound (default: 10)
//! - `FIREHOSE_CONNECT_TIMEOUT_SECS`: Handshake bound (default: 10)
//! - `FIREHOSE_RECONNECT_DELAY_SECS`: First reconnect delay (default: 5)
//! - `FIREHOSE_MAX_RECONNECT_DELAY_SECS`: Reconnect delay ceiling (default: 60)
//! - `FIREHOSE_RECONNECT_MULTIPLIER`: Backoff growth factor (default: 2.0)
//! - `FIREHOSE_RECONNECT_JITTER`: Backoff jitter fraction (default: 0.0)
//! - `FIREHOSE_MAX_RECONNECT_ATTEMPTS`: Retry budget (default: unlimited)
//! - `FIREHOSE_SUBSCRIBE`: Text frame sent after every connect
//! - `FIREHOSE_AUTH_TOKEN`: Bearer token for the handshake
//! - `FIREHOSE_HEALTH_PORT`: Health check HTTP port, 0 disables (default: 8083)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: firehose-client)
//! - `RUST_LOG`: Log level (default: info)

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use firehose_client::infrastructure::telemetry;
use firehose_client::{
    ClientSettings, HealthServer, HealthServerState, JsonCodec, PrometheusMetrics,
    ReconnectingStreamClient, RunOutcome, StreamEvent, WebSocketTransport, init_metrics,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Lifecycle events buffered between the client and the event logger.
const EVENT_BUFFER: usize = 256;

/// Extra time allowed after the client's own bounds before the run task is aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init().context("failed to initialize telemetry")?;

    tracing::info!("Starting firehose tail");

    init_metrics().context("failed to initialize metrics")?;

    let settings = ClientSettings::from_env().context("invalid configuration")?;
    log_settings(&settings);

    let mut transport = WebSocketTransport::new();
    if let Some(token) = &settings.auth_token {
        transport = transport.with_bearer_token(token.expose());
    }

    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
    let client = Arc::new(
        ReconnectingStreamClient::new(
            settings.client.clone(),
            transport,
            JsonCodec::<serde_json::Value>::new(),
            print_message,
        )?
        .with_metrics(Arc::new(PrometheusMetrics::new(settings.client.name.clone())))
        .with_events(event_tx),
    );

    let shutdown_token = CancellationToken::new();

    if settings.server.health_enabled() {
        let health_state = Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            client.status(),
        ));
        let health_server = HealthServer::new(
            settings.server.health_port,
            health_state,
            shutdown_token.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    tokio::spawn(log_events(event_rx));

    let runner = Arc::clone(&client);
    let mut run = tokio::spawn(async move { runner.start().await });

    // An in-flight receive or probe is not interrupted by stop().
    let drain_limit =
        settings.client.receive_timeout + settings.client.probe_timeout + SHUTDOWN_GRACE;

    let outcome = tokio::select! {
        result = &mut run => result?,
        () = await_shutdown() => {
            tracing::info!(
                timeout_secs = drain_limit.as_secs(),
                "Graceful shutdown started"
            );
            let stop = client.stop_handle();
            if let Some(result) = stop.stop_until_finished(&mut run, drain_limit).await {
                result?
            } else {
                tracing::warn!("Stream client did not stop in time, aborting");
                run.abort();
                RunOutcome::Stopped
            }
        }
    };

    shutdown_token.cancel();

    match outcome {
        RunOutcome::Stopped | RunOutcome::AlreadyRunning => {
            tracing::info!("Firehose tail stopped");
            Ok(())
        }
        RunOutcome::RetriesExhausted { attempts } => {
            bail!("gave up after {attempts} connection attempts")
        }
    }
}

/// Write one message to stdout as a single line.
fn print_message(message: serde_json::Value) {
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{message}") {
        tracing::warn!(error = %e, "Failed to write message to stdout");
    }
}

/// Trace lifecycle events the client emits.
async fn log_events(mut rx: mpsc::Receiver<StreamEvent>) {
    while let Some(event) = rx.recv().await {
        if let StreamEvent::MalformedMessage { error } = &event {
            tracing::debug!(error = %error, "Dropped malformed message");
        } else {
            tracing::debug!(?event, "Stream event");
        }
    }
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_settings(settings: &ClientSettings) {
    let client = &settings.client;
    tracing::info!(
        name = %client.name,
        endpoint = %client.endpoint,
        health_port = settings.server.health_port,
        authenticated = settings.auth_token.is_some(),
        "Configuration loaded"
    );
    tracing::debug!(
        receive_timeout_secs = client.receive_timeout.as_secs_f64(),
        probe_timeout_secs = client.probe_timeout.as_secs_f64(),
        connect_timeout_secs = client.connect_timeout.as_secs_f64(),
        initial_reconnect_delay_secs = client.initial_reconnect_delay.as_secs_f64(),
        max_reconnect_delay_secs = client.max_reconnect_delay.as_secs_f64(),
        max_reconnect_attempts = ?client.max_reconnect_attempts,
        subscribe_messages = client.subscribe_messages.len(),
        "Client settings"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
