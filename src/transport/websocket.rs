//! WebSocket transport factory.
//!
//! [`WebsocketTransport`] owns a shared [`TransportConfig`] and mints
//! [`WebsocketConnection`]s, either by dialing a server or by upgrading an
//! inbound HTTP request.
//!
//! # Upgrade Rules
//!
//! - The request method must be `GET`
//! - `Connection` must contain the `upgrade` token
//! - `Upgrade` must be `websocket`
//! - `Sec-WebSocket-Version` must be `13`
//! - `Sec-WebSocket-Key` must be a base64-encoded 16-byte nonce
//!
//! Rejected requests receive `503 Service Unavailable` with a body of
//! `"Upgrade failed: "` followed by the reason.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};

use super::config::TransportConfig;
use super::connection::WebsocketConnection;
use super::request::RequestContext;
use super::{Connection, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Prefix of every upgrade rejection body.
pub const UPGRADE_FAILED_PREFIX: &str = "Upgrade failed: ";

/// The only WebSocket protocol version accepted.
const WEBSOCKET_VERSION: &str = "13";

/// Decoded length of a `Sec-WebSocket-Key` nonce.
const WEBSOCKET_KEY_LEN: usize = 16;

// ============================================================================
// WebsocketTransport
// ============================================================================

/// Factory for WebSocket connections.
///
/// Cloning is cheap; clones share the same config.
#[derive(Debug, Clone, Default)]
pub struct WebsocketTransport {
    /// Shared, read-only config.
    config: Arc<TransportConfig>,
}

impl WebsocketTransport {
    /// Creates a transport from a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the config is invalid.
    pub fn new(config: TransportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Returns the transport config.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Dials a WebSocket server.
    ///
    /// Sends the configured headers and uses the configured TLS policy for
    /// `wss://` targets.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `target` is not a valid URL
    /// - [`Error::WebSocket`] with the handshake error, unchanged
    pub async fn connect(&self, target: &str) -> Result<WebsocketConnection> {
        let url = Url::parse(target)?;

        let mut request = url.as_str().into_client_request()?;
        request.headers_mut().extend(self.config.headers.clone());

        let connector = self
            .config
            .tls_config
            .as_ref()
            .map(|tls| Connector::Rustls(Arc::clone(tls)));

        let (socket, response) =
            tokio_tungstenite::connect_async_tls_with_config(request, None, false, connector)
                .await
                .inspect_err(|e| debug!(%url, error = %e, "WebSocket dial failed"))?;

        let connection = WebsocketConnection::new(socket, Arc::clone(&self.config));
        info!(
            conn_id = %connection.id(),
            %url,
            status = %response.status(),
            "WebSocket connection established"
        );

        Ok(connection)
    }

    /// Upgrades an inbound HTTP request to a WebSocket connection.
    ///
    /// Read and write buffers are sized from the config's buffer size.
    ///
    /// # Errors
    ///
    /// - [`Error::MethodNotAllowed`] if the method is not `GET`
    /// - [`Error::HttpUpgradeFailed`] if the handshake fails
    ///
    /// In both cases a `503` response has been written to the peer before
    /// this returns.
    pub async fn handle_connection(
        &self,
        mut request: RequestContext,
    ) -> Result<WebsocketConnection> {
        let peer = request.peer_addr();

        if request.method() != Method::GET {
            debug!(%peer, method = %request.method(), "Upgrade rejected: method");
            reject(&mut request, &Error::MethodNotAllowed.to_string()).await;
            return Err(Error::MethodNotAllowed);
        }

        let accept_key = match accept_key(request.headers()) {
            Ok(key) => key,
            Err(reason) => {
                debug!(%peer, reason, "Upgrade rejected: handshake");
                reject(&mut request, reason).await;
                return Err(Error::HttpUpgradeFailed);
            }
        };

        if let Err(e) = request.respond_switching_protocols(&accept_key).await {
            debug!(%peer, error = %e, "Upgrade response not sent");
            reject(&mut request, "Failed to write upgrade response").await;
            return Err(Error::HttpUpgradeFailed);
        }

        let socket = WebSocketStream::from_raw_socket(
            MaybeTlsStream::Plain(request.into_stream()),
            Role::Server,
            Some(self.config.websocket_config()),
        )
        .await;

        let connection = WebsocketConnection::new(socket, Arc::clone(&self.config));
        info!(conn_id = %connection.id(), %peer, "WebSocket connection accepted");

        Ok(connection)
    }

    /// Services a request after the upgrade.
    ///
    /// WebSocket connections need no further servicing, so this does nothing.
    #[inline]
    pub async fn serve(&self, _request: &mut RequestContext) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Handshake Helpers
// ============================================================================

/// Writes a `503` rejection with the reason in the body.
async fn reject(request: &mut RequestContext, reason: &str) {
    let body = format!("{UPGRADE_FAILED_PREFIX}{reason}\n");

    if let Err(e) = request
        .respond_error(StatusCode::SERVICE_UNAVAILABLE, &body)
        .await
    {
        warn!(peer = %request.peer_addr(), error = %e, "Failed to send upgrade rejection");
    }
}

/// Validates upgrade headers and derives the `Sec-WebSocket-Accept` value.
fn accept_key(headers: &HeaderMap) -> std::result::Result<String, &'static str> {
    let connection = headers
        .get(header::CONNECTION)
        .ok_or("Missing Connection header")?;
    if !header_has_token(connection, "upgrade") {
        return Err("Connection header must contain 'upgrade'");
    }

    let upgrade = headers
        .get(header::UPGRADE)
        .ok_or("Missing Upgrade header")?;
    if !upgrade
        .to_str()
        .is_ok_and(|value| value.eq_ignore_ascii_case("websocket"))
    {
        return Err("Upgrade header must be 'websocket'");
    }

    match headers.get(header::SEC_WEBSOCKET_VERSION) {
        Some(version) if version == WEBSOCKET_VERSION => {}
        _ => return Err("Unsupported Sec-WebSocket-Version, only 13 is accepted"),
    }

    let key = headers
        .get(header::SEC_WEBSOCKET_KEY)
        .ok_or("Missing Sec-WebSocket-Key header")?;
    if key.is_empty() {
        return Err("Empty Sec-WebSocket-Key header");
    }
    if !Base64Standard
        .decode(key.as_bytes())
        .is_ok_and(|nonce| nonce.len() == WEBSOCKET_KEY_LEN)
    {
        return Err("Sec-WebSocket-Key must be a base64-encoded 16-byte nonce");
    }

    Ok(derive_accept_key(key.as_bytes()))
}

/// Returns `true` if a comma-separated header value contains `token`.
fn header_has_token(value: &HeaderValue, token: &str) -> bool {
    value.to_str().is_ok_and(|value| {
        value
            .split(',')
            .any(|part| part.trim().eq_ignore_ascii_case(token))
    })
}

// ============================================================================
// Transport Trait
// ============================================================================

#[async_trait]
impl Transport for WebsocketTransport {
    async fn connect(&self, target: &str) -> Result<Box<dyn Connection>> {
        let connection = WebsocketTransport::connect(self, target).await?;
        Ok(Box::new(connection))
    }

    async fn handle_connection(&self, request: RequestContext) -> Result<Box<dyn Connection>> {
        let connection = WebsocketTransport::handle_connection(self, request).await?;
        Ok(Box::new(connection))
    }

    async fn serve(&self, request: &mut RequestContext) -> Result<()> {
        WebsocketTransport::serve(self, request).await
    }
}

// ============================================================================
// Tests
// ============================================================================
