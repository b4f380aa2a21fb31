//! Transport configuration.
//!
//! Holds the keepalive, deadline and buffering parameters shared by every
//! connection a transport produces.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use ws_duplex::TransportConfig;
//!
//! let config = TransportConfig::default()
//!     .with_receive_timeout(Duration::from_secs(10))
//!     .with_buffer_size(64 * 1024);
//!
//! config.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_rustls::rustls::ClientConfig;
use tokio_tungstenite::tungstenite::http::{HeaderMap, HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default interval between heartbeat pings.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

/// Default time a heartbeat waits for its response.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(60);

/// Default per-read deadline.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default per-write deadline.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(60);

/// Default read/write buffer size for server upgrades (32 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

// ============================================================================
// TransportConfig
// ============================================================================

/// Parameters shared by all connections of one transport.
///
/// Once handed to [`WebsocketTransport`](super::WebsocketTransport) the
/// config sits behind an `Arc` and is only ever read.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Interval between heartbeat pings.
    pub ping_interval: Duration,
    /// Time a heartbeat waits for its response before giving up.
    pub ping_timeout: Duration,
    /// Deadline applied to each read.
    pub receive_timeout: Duration,
    /// Deadline applied to each write.
    pub send_timeout: Duration,
    /// Read and write buffer size used for server upgrades.
    pub buffer_size: usize,
    /// Headers sent with the client handshake request.
    pub headers: HeaderMap,
    /// TLS policy for `wss://` dials. `None` uses the built-in roots.
    pub tls_config: Option<Arc<ClientConfig>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            headers: HeaderMap::new(),
            tls_config: None,
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl TransportConfig {
    /// Creates a config with default parameters.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a default config carrying client headers and a TLS policy.
    #[must_use]
    pub fn with_tls(headers: HeaderMap, tls_config: Option<Arc<ClientConfig>>) -> Self {
        Self {
            headers,
            tls_config,
            ..Self::default()
        }
    }

    /// Loads a config from JSON-encoded [`TransportSettings`].
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document is malformed
    /// - [`Error::Config`] if a header is invalid or a value breaks an invariant
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: TransportSettings = serde_json::from_str(json)?;
        let config = Self::try_from(settings)?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl TransportConfig {
    /// Sets the heartbeat ping interval.
    #[inline]
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets the heartbeat ping timeout.
    #[inline]
    #[must_use]
    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Sets the per-read deadline.
    #[inline]
    #[must_use]
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Sets the per-write deadline.
    #[inline]
    #[must_use]
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Sets the upgrade buffer size in bytes.
    #[inline]
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Adds a header to the client handshake request.
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

// ============================================================================
// Validation & Conversion
// ============================================================================

impl TransportConfig {
    /// Validates the config invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a duration is zero or the buffer size is zero.
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("ping interval", self.ping_interval),
            ("ping timeout", self.ping_timeout),
            ("receive timeout", self.receive_timeout),
            ("send timeout", self.send_timeout),
        ];

        for (name, value) in durations {
            if value.is_zero() {
                return Err(Error::config(format!("{name} must be greater than zero")));
            }
        }

        if self.buffer_size == 0 {
            return Err(Error::config("buffer size must be greater than zero"));
        }

        Ok(())
    }

    /// Returns the socket config used for server upgrades.
    #[must_use]
    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig::default()
            .read_buffer_size(self.buffer_size)
            .write_buffer_size(self.buffer_size)
    }

    /// Exports the serializable part of this config.
    ///
    /// The TLS policy is not serializable and is left out.
    #[must_use]
    pub fn settings(&self) -> TransportSettings {
        let headers = self
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        TransportSettings {
            ping_interval_ms: duration_ms(self.ping_interval),
            ping_timeout_ms: duration_ms(self.ping_timeout),
            receive_timeout_ms: duration_ms(self.receive_timeout),
            send_timeout_ms: duration_ms(self.send_timeout),
            buffer_size: self.buffer_size,
            headers,
        }
    }
}

/// Converts a duration to whole milliseconds, saturating at `u64::MAX`.
#[inline]
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// TransportSettings
// ============================================================================

/// Serializable form of [`TransportConfig`].
///
/// Durations are in milliseconds. Field names are camelCase on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportSettings {
    /// Heartbeat ping interval in milliseconds.
    pub ping_interval_ms: u64,
    /// Heartbeat ping timeout in milliseconds.
    pub ping_timeout_ms: u64,
    /// Per-read deadline in milliseconds.
    pub receive_timeout_ms: u64,
    /// Per-write deadline in milliseconds.
    pub send_timeout_ms: u64,
    /// Upgrade buffer size in bytes.
    pub buffer_size: usize,
    /// Client handshake headers.
    pub headers: BTreeMap<String, String>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        TransportConfig::default().settings()
    }
}

impl TryFrom<TransportSettings> for TransportConfig {
    type Error = Error;

    fn try_from(settings: TransportSettings) -> Result<Self> {
        let mut headers = HeaderMap::with_capacity(settings.headers.len());
        for (name, value) in &settings.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::config(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::config(format!("invalid header value for '{name}': {e}")))?;
            headers.insert(name, value);
        }

        Ok(Self {
            ping_interval: Duration::from_millis(settings.ping_interval_ms),
            ping_timeout: Duration::from_millis(settings.ping_timeout_ms),
            receive_timeout: Duration::from_millis(settings.receive_timeout_ms),
            send_timeout: Duration::from_millis(settings.send_timeout_ms),
            buffer_size: settings.buffer_size,
            headers,
            tls_config: None,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = TransportConfig::default();
        assert_eq!(config.ping_interval, Duration::from_secs(30));
        assert_eq!(config.ping_timeout, Duration::from_secs(60));
        assert_eq!(config.receive_timeout, Duration::from_secs(60));
        assert_eq!(config.send_timeout, Duration::from_secs(60));
        assert_eq!(config.buffer_size, 32768);
        assert!(config.headers.is_empty());
        assert!(config.tls_config.is_none());
    }

    #[test]
    fn test_default_is_fresh_value() {
        let mut first = TransportConfig::default();
        first.buffer_size = 1;

        assert_eq!(first.buffer_size, 1);
        assert_eq!(TransportConfig::new().buffer_size, DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_with_tls_keeps_defaults() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer t"));

        let config = TransportConfig::with_tls(headers, None);
        assert_eq!(config.headers.get("authorization").unwrap(), "Bearer t");
        assert_eq!(config.ping_interval, DEFAULT_PING_INTERVAL);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert!(config.tls_config.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let config = TransportConfig::new()
            .with_ping_interval(Duration::from_secs(5))
            .with_ping_timeout(Duration::from_secs(10))
            .with_receive_timeout(Duration::from_secs(15))
            .with_send_timeout(Duration::from_secs(20))
            .with_buffer_size(4096)
            .with_header(
                HeaderName::from_static("x-client"),
                HeaderValue::from_static("test"),
            );

        assert_eq!(config.ping_interval, Duration::from_secs(5));
        assert_eq!(config.ping_timeout, Duration::from_secs(10));
        assert_eq!(config.receive_timeout, Duration::from_secs(15));
        assert_eq!(config.send_timeout, Duration::from_secs(20));
        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.headers.get("x-client").unwrap(), "test");
    }

    #[test]
    fn test_validate_default_ok() {
        assert!(TransportConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_duration() {
        let config = TransportConfig::new().with_send_timeout(Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("send timeout"));
    }

    #[test]
    fn test_validate_zero_buffer() {
        let config = TransportConfig::new().with_buffer_size(0);
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_websocket_config_buffer_sizes() {
        let ws_config = TransportConfig::new().with_buffer_size(4096).websocket_config();
        assert_eq!(ws_config.read_buffer_size, 4096);
        assert_eq!(ws_config.write_buffer_size, 4096);
    }

    #[test]
    fn test_duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_secs(10)), 10_000);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_settings_export() {
        let settings = TransportConfig::default().settings();
        assert_eq!(settings.ping_interval_ms, 30_000);
        assert_eq!(settings.ping_timeout_ms, 60_000);
        assert_eq!(settings.receive_timeout_ms, 60_000);
        assert_eq!(settings.send_timeout_ms, 60_000);
        assert_eq!(settings.buffer_size, 32_768);
        assert!(settings.headers.is_empty());
    }

    #[test]
    fn test_from_json_partial() {
        let config = TransportConfig::from_json(
            r#"{"receiveTimeoutMs": 5000, "headers": {"x-token": "abc"}}"#,
        )
        .expect("valid settings");

        assert_eq!(config.receive_timeout, Duration::from_secs(5));
        assert_eq!(config.ping_interval, DEFAULT_PING_INTERVAL);
        assert_eq!(config.headers.get("x-token").unwrap(), "abc");
    }

    #[test]
    fn test_from_json_rejects_zero() {
        let result = TransportConfig::from_json(r#"{"bufferSize": 0}"#);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_from_json_rejects_bad_header() {
        let result = TransportConfig::from_json(r#"{"headers": {"bad header": "x"}}"#);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_from_json_malformed() {
        let result = TransportConfig::from_json("{not json");
        assert!(matches!(result, Err(Error::Json(_))));
    }
}
