//! Client Configuration Settings
//!
//! Configuration for the `firehose-tail` binary, loaded from environment
//! variables. Lookup goes through a closure so parsing can be tested
//! without touching the process environment.

use std::time::Duration;

use crate::domain::connection::{
    ClientConfig, ConfigError, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_RECONNECT_DELAY,
    DEFAULT_PROBE_TIMEOUT, DEFAULT_RECEIVE_TIMEOUT, DEFAULT_RECONNECT_DELAY,
};

/// Default health server port.
pub const DEFAULT_HEALTH_PORT: u16 = 8083;

/// Errors loading settings from the environment.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Required environment variable not set.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable is set but empty.
    #[error("Environment variable is empty: {0}")]
    EmptyValue(String),

    /// The assembled client configuration failed validation.
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Bearer token sent with the WebSocket handshake.
#[derive(Clone)]
pub struct AuthToken(String);

impl AuthToken {
    /// Create a token.
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// Get the token value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

/// Health server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check HTTP port (0 = disabled).
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            health_port: DEFAULT_HEALTH_PORT,
        }
    }
}

impl ServerSettings {
    /// Whether the health server should run.
    #[must_use]
    pub const fn health_enabled(&self) -> bool {
        self.health_port != 0
    }
}

/// Complete binary configuration.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Stream client configuration.
    pub client: ClientConfig,
    /// Optional handshake bearer token.
    pub auth_token: Option<AuthToken>,
    /// Health server settings.
    pub server: ServerSettings,
}

impl ClientSettings {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `FIREHOSE_ENDPOINT` is missing or empty, or the
    /// assembled client configuration is invalid.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ClientSettings::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup("FIREHOSE_ENDPOINT")
            .ok_or_else(|| SettingsError::MissingEnvVar("FIREHOSE_ENDPOINT".to_string()))?;

        if endpoint.trim().is_empty() {
            return Err(SettingsError::EmptyValue("FIREHOSE_ENDPOINT".to_string()));
        }

        let mut client = ClientConfig::new(endpoint.trim());

        if let Some(name) = lookup("FIREHOSE_NAME").filter(|n| !n.trim().is_empty()) {
            client.name = name.trim().to_string();
        }

        client.receive_timeout = parse_duration_secs(
            &lookup,
            "FIREHOSE_RECEIVE_TIMEOUT_SECS",
            DEFAULT_RECEIVE_TIMEOUT,
        );
        client.probe_timeout =
            parse_duration_secs(&lookup, "FIREHOSE_PROBE_TIMEOUT_SECS", DEFAULT_PROBE_TIMEOUT);
        client.connect_timeout = parse_duration_secs(
            &lookup,
            "FIREHOSE_CONNECT_TIMEOUT_SECS",
            DEFAULT_CONNECT_TIMEOUT,
        );
        client.initial_reconnect_delay = parse_duration_secs(
            &lookup,
            "FIREHOSE_RECONNECT_DELAY_SECS",
            DEFAULT_RECONNECT_DELAY,
        );
        client.max_reconnect_delay = parse_duration_secs(
            &lookup,
            "FIREHOSE_MAX_RECONNECT_DELAY_SECS",
            DEFAULT_MAX_RECONNECT_DELAY,
        );
        client.backoff_multiplier = parse_f64(
            &lookup,
            "FIREHOSE_RECONNECT_MULTIPLIER",
            client.backoff_multiplier,
        );
        client.jitter_factor = parse_f64(&lookup, "FIREHOSE_RECONNECT_JITTER", client.jitter_factor);
        client.max_reconnect_attempts = parse_max_attempts(&lookup, "FIREHOSE_MAX_RECONNECT_ATTEMPTS");

        if let Some(subscribe) = lookup("FIREHOSE_SUBSCRIBE").filter(|s| !s.trim().is_empty()) {
            client.subscribe_messages.push(subscribe);
        }

        client.validate()?;

        let auth_token = lookup("FIREHOSE_AUTH_TOKEN")
            .filter(|t| !t.is_empty())
            .map(AuthToken::new);

        let server = ServerSettings {
            health_port: parse_u16(&lookup, "FIREHOSE_HEALTH_PORT", DEFAULT_HEALTH_PORT),
        };

        Ok(Self {
            client,
            auth_token,
            server,
        })
    }
}

fn parse_u16<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: u16) -> u16 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_f64<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: f64) -> f64 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(default)
}

/// Unset, empty, `unlimited` or unparseable values mean no cap.
fn parse_max_attempts<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<u32> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<ClientSettings, SettingsError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ClientSettings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn endpoint_required() {
        let err = settings(&[]).unwrap_err();
        assert!(matches!(err, SettingsError::MissingEnvVar(ref k) if k == "FIREHOSE_ENDPOINT"));
    }

    #[test]
    fn endpoint_must_not_be_blank() {
        let err = settings(&[("FIREHOSE_ENDPOINT", "   ")]).unwrap_err();
        assert!(matches!(err, SettingsError::EmptyValue(_)));
    }

    #[test]
    fn defaults_applied() {
        let s = settings(&[("FIREHOSE_ENDPOINT", "wss://feed.example.test/subscribe")]).unwrap();
        assert_eq!(s.client.endpoint, "wss://feed.example.test/subscribe");
        assert_eq!(s.client.name, "firehose");
        assert_eq!(s.client.receive_timeout, Duration::from_secs(30));
        assert_eq!(s.client.probe_timeout, Duration::from_secs(10));
        assert_eq!(s.client.initial_reconnect_delay, Duration::from_secs(5));
        assert_eq!(s.client.max_reconnect_delay, Duration::from_secs(60));
        assert_eq!(s.client.max_reconnect_attempts, None);
        assert!(s.client.subscribe_messages.is_empty());
        assert!(s.auth_token.is_none());
        assert_eq!(s.server.health_port, DEFAULT_HEALTH_PORT);
        assert!(s.server.health_enabled());
    }

    #[test]
    fn overrides_applied() {
        let s = settings(&[
            ("FIREHOSE_ENDPOINT", "ws://localhost:9000"),
            ("FIREHOSE_NAME", "jetstream"),
            ("FIREHOSE_RECEIVE_TIMEOUT_SECS", "5"),
            ("FIREHOSE_PROBE_TIMEOUT_SECS", "2.5"),
            ("FIREHOSE_RECONNECT_DELAY_SECS", "1"),
            ("FIREHOSE_MAX_RECONNECT_DELAY_SECS", "10"),
            ("FIREHOSE_MAX_RECONNECT_ATTEMPTS", "3"),
            ("FIREHOSE_SUBSCRIBE", r#"{"op":"subscribe"}"#),
            ("FIREHOSE_AUTH_TOKEN", "tok"),
            ("FIREHOSE_HEALTH_PORT", "0"),
        ])
        .unwrap();

        assert_eq!(s.client.name, "jetstream");
        assert_eq!(s.client.receive_timeout, Duration::from_secs(5));
        assert_eq!(s.client.probe_timeout, Duration::from_millis(2500));
        assert_eq!(s.client.initial_reconnect_delay, Duration::from_secs(1));
        assert_eq!(s.client.max_reconnect_delay, Duration::from_secs(10));
        assert_eq!(s.client.max_reconnect_attempts, Some(3));
        assert_eq!(s.client.subscribe_messages, vec![r#"{"op":"subscribe"}"#]);
        assert_eq!(s.auth_token.unwrap().expose(), "tok");
        assert!(!s.server.health_enabled());
    }

    #[test_case("3" => Some(3) ; "number")]
    #[test_case(" 0 " => Some(0) ; "zero with whitespace")]
    #[test_case("" => None ; "empty")]
    #[test_case("unlimited" => None ; "word")]
    #[test_case("-1" => None ; "negative")]
    fn max_attempts_parsing(raw: &str) -> Option<u32> {
        let raw = raw.to_string();
        parse_max_attempts(&|_: &str| Some(raw.clone()), "KEY")
    }

    #[test_case("abc", 30 ; "garbage falls back")]
    #[test_case("-4", 30 ; "negative falls back")]
    #[test_case("12", 12 ; "whole seconds")]
    #[test_case("1e20", 30 ; "beyond duration range falls back")]
    #[test_case("inf", 30 ; "infinity falls back")]
    #[test_case("NaN", 30 ; "nan falls back")]
    fn duration_parsing(raw: &str, expected_secs: u64) {
        let raw = raw.to_string();
        let parsed = parse_duration_secs(&|_: &str| Some(raw.clone()), "KEY", Duration::from_secs(30));
        assert_eq!(parsed, Duration::from_secs(expected_secs));
    }

    #[test]
    fn invalid_combination_rejected() {
        let err = settings(&[
            ("FIREHOSE_ENDPOINT", "ws://localhost:9000"),
            ("FIREHOSE_RECONNECT_DELAY_SECS", "90"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid(ConfigError::Invalid { field: "max_reconnect_delay", .. })
        ));
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = settings(&[
            ("FIREHOSE_ENDPOINT", "ws://localhost:9000"),
            ("FIREHOSE_RECEIVE_TIMEOUT_SECS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid(ConfigError::Invalid { field: "receive_timeout", .. })
        ));
    }

    #[test]
    fn auth_token_redacted_debug() {
        let token = AuthToken::new("secret456".to_string());
        let debug = format!("{token:?}");
        assert!(!debug.contains("secret456"));
        assert!(debug.contains("[REDACTED]"));
    }
}
