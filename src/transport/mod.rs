//! WebSocket transport layer.
//!
//! This module provides the [`Connection`] and [`Transport`] abstractions
//! and their WebSocket implementation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Client         │                              │  Server         │
//! │                 │         WebSocket            │                 │
//! │  connect()      │◄────────────────────────────►│  Listener       │
//! │  → Connection   │      text frames only        │  → RequestCtx   │
//! │                 │                              │  → Connection   │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `WebsocketTransport::new` - Validate and share a [`TransportConfig`]
//! 2. `connect` (client) or `handle_connection` (server) - Open a connection
//! 3. `read_message` / `write_message` - Exchange text messages
//! 4. `close` - Release the socket
//!
//! Read/write failures never close the connection; that decision belongs
//! to the caller.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `config` | Transport parameters and defaults |
//! | `connection` | WebSocket connection |
//! | `request` | Inbound HTTP upgrade request |
//! | `server` | TCP listener for upgrade requests |
//! | `websocket` | Transport factory and upgrade handshake |

// ============================================================================
// Submodules
// ============================================================================

/// Transport parameters and defaults.
pub mod config;

/// WebSocket connection.
pub mod connection;

/// Inbound HTTP upgrade request.
pub mod request;

/// TCP listener for upgrade requests.
pub mod server;

/// Transport factory and upgrade handshake.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{
    DEFAULT_BUFFER_SIZE, DEFAULT_PING_INTERVAL, DEFAULT_PING_TIMEOUT, DEFAULT_RECEIVE_TIMEOUT,
    DEFAULT_SEND_TIMEOUT, TransportConfig, TransportSettings,
};
pub use connection::{WebsocketConnection, WsSocket};
pub use request::RequestContext;
pub use server::Listener;
pub use websocket::{UPGRADE_FAILED_PREFIX, WebsocketTransport};

// ============================================================================
// Traits
// ============================================================================

/// A message-oriented duplex channel to one peer.
///
/// Implementations must allow one reader and one writer to operate
/// concurrently.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Reads the next message.
    async fn read_message(&self) -> Result<String>;

    /// Writes one message.
    async fn write_message(&self, text: &str) -> Result<()>;

    /// Releases the connection. Safe to call more than once.
    async fn close(&self);

    /// Returns the heartbeat `(interval, timeout)` for an external driver.
    fn ping_params(&self) -> (Duration, Duration);
}

/// A factory for [`Connection`]s.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dials `target` as a client.
    async fn connect(&self, target: &str) -> Result<Box<dyn Connection>>;

    /// Accepts an inbound request as a server.
    async fn handle_connection(&self, request: RequestContext) -> Result<Box<dyn Connection>>;

    /// Services a request that needs work beyond the initial upgrade.
    async fn serve(&self, request: &mut RequestContext) -> Result<()>;
}
