//! ws-duplex - Message-oriented WebSocket duplex transport.
//!
//! This library provides a bidirectional text-message transport over
//! WebSocket, usable as one interchangeable implementation behind a
//! generic [`Connection`] abstraction.
//!
//! # Architecture
//!
//! - **[`TransportConfig`]**: keepalive, deadline and buffer parameters
//! - **[`WebsocketTransport`]**: dials servers and upgrades inbound requests
//! - **[`WebsocketConnection`]**: reads and writes text messages
//!
//! Key design principles:
//!
//! - Only text frames carry messages; binary and empty frames are rejected
//! - Every read and write has its own deadline
//! - Heartbeats are driven by the caller using [`Connection::ping_params`]
//! - No background tasks are spawned
//!
//! # Quick Start
//!
//! ```no_run
//! use ws_duplex::{Result, WebsocketTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let transport = WebsocketTransport::default();
//!
//!     let conn = transport.connect("ws://127.0.0.1:9000/ws").await?;
//!     conn.write_message("hello").await?;
//!     let reply = conn.read_message().await?;
//!     println!("reply: {reply}");
//!
//!     conn.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`transport`] | Connection abstraction and WebSocket transport |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// WebSocket transport layer.
///
/// Connection and transport traits, configuration, and the WebSocket
/// implementation.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::ConnectionId;

// Transport types
pub use transport::{
    Connection, Listener, RequestContext, Transport, TransportConfig, TransportSettings,
    WebsocketConnection, WebsocketTransport,
};
