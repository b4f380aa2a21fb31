//! Error types for the WebSocket duplex transport.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use ws_duplex::{Connection, Error, Result};
//!
//! async fn next_text(conn: &dyn Connection) -> Result<Option<String>> {
//!     match conn.read_message().await {
//!         Ok(text) => Ok(Some(text)),
//!         Err(Error::BinaryMessage) => Ok(None),
//!         Err(e) => Err(e),
//!     }
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Protocol | [`Error::BinaryMessage`], [`Error::PacketWrong`], [`Error::Protocol`] |
//! | Buffering | [`Error::BadBuffer`] |
//! | Handshake | [`Error::MethodNotAllowed`], [`Error::HttpUpgradeFailed`] |
//! | Connection | [`Error::ConnectionClosed`], [`Error::Timeout`] |
//! | External | [`Error::Io`], [`Error::WebSocket`], [`Error::Url`], [`Error::Json`] |
//!
//! Handshake errors are fixed sentinels. The detail of a failed upgrade is
//! written to the peer in the HTTP response body, never carried in the error.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when a transport configuration violates its invariants.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// A binary frame was received.
    ///
    /// Only text frames are carried by this transport.
    #[error("Binary messages are not supported")]
    BinaryMessage,

    /// A text frame with an empty payload was received.
    #[error("Wrong packet type error")]
    PacketWrong,

    /// Malformed HTTP request head.
    ///
    /// Returned when an inbound upgrade request cannot be parsed.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Buffering Errors
    // ========================================================================
    /// Frame body could not be fully read or decoded.
    #[error("Buffer error")]
    BadBuffer,

    // ========================================================================
    // Handshake Errors
    // ========================================================================
    /// Upgrade request used a method other than `GET`.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The WebSocket upgrade handshake failed.
    #[error("Http upgrade failed")]
    HttpUpgradeFailed,

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connection is closed.
    ///
    /// Returned after [`close`](crate::Connection::close) or when the peer
    /// ends the stream.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Per-operation deadline elapsed.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Operation that timed out (`read` or `write`).
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// WebSocket error, passed through from the socket layer unchanged.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Dial target is not a valid URL.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Settings (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the peer sent a frame this transport rejects.
    #[inline]
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::BinaryMessage | Self::PacketWrong)
    }

    /// Returns `true` if this is an upgrade handshake rejection.
    #[inline]
    #[must_use]
    pub fn is_handshake_error(&self) -> bool {
        matches!(self, Self::MethodNotAllowed | Self::HttpUpgradeFailed)
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::Timeout { .. } | Self::Io(_) | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
