//! WebSocket connection.
//!
//! Frame-level message exchange over one established socket.
//!
//! # Framing Rules
//!
//! - Only text frames carry messages; a binary frame is rejected
//! - Empty text frames are protocol violations
//! - Ping/pong control frames are answered by the socket layer and skipped
//!
//! # Deadlines
//!
//! Each [`WebsocketConnection::read_message`] and
//! [`WebsocketConnection::write_message`] call starts its own deadline
//! from the config's receive/send timeout. A missed deadline is returned
//! as [`Error::Timeout`] and leaves the connection usable.
//!
//! # Closing
//!
//! [`WebsocketConnection::close`] wakes any read or write in flight with
//! [`Error::ConnectionClosed`], sends a close frame and then drops both
//! socket halves, which releases the TCP stream.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, timeout, timeout_at};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

use super::Connection;
use super::config::{TransportConfig, duration_ms};

// ============================================================================
// Types
// ============================================================================

/// Socket type shared by client and server connections.
pub type WsSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// WebsocketConnection
// ============================================================================

/// A live WebSocket connection carrying text messages.
///
/// # Thread Safety
///
/// Reads and writes are serialized independently: one task may read while
/// another writes. Concurrent reads (or concurrent writes) queue behind
/// each other.
pub struct WebsocketConnection {
    /// Connection ID for log correlation.
    id: ConnectionId,
    /// Write half. `None` once released by `close`.
    sink: Mutex<Option<SplitSink<WsSocket, Message>>>,
    /// Read half. `None` once released by `close`.
    stream: Mutex<Option<SplitStream<WsSocket>>>,
    /// Config of the transport that created this connection.
    config: Arc<TransportConfig>,
    /// Set once by `close`.
    closed: AtomicBool,
    /// Flipped to `true` by `close` to wake pending reads and writes.
    close_signal: watch::Sender<bool>,
}

impl WebsocketConnection {
    /// Wraps an established socket.
    pub(crate) fn new(socket: WsSocket, config: Arc<TransportConfig>) -> Self {
        let (sink, stream) = socket.split();
        let (close_signal, _) = watch::channel(false);

        Self {
            id: ConnectionId::generate(),
            sink: Mutex::new(Some(sink)),
            stream: Mutex::new(Some(stream)),
            config,
            closed: AtomicBool::new(false),
            close_signal,
        }
    }

    /// Returns the connection ID.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the config this connection was created with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Reads the next text message.
    ///
    /// # Errors
    ///
    /// - [`Error::BinaryMessage`] if the frame is binary
    /// - [`Error::BadBuffer`] if the frame body cannot be decoded
    /// - [`Error::PacketWrong`] if the text is empty
    /// - [`Error::Timeout`] if the receive deadline elapses
    /// - [`Error::ConnectionClosed`] if closed locally or by the peer
    /// - [`Error::WebSocket`] for any other socket failure
    pub async fn read_message(&self) -> Result<String> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let receive_timeout = self.config.receive_timeout;
        let deadline = Instant::now() + receive_timeout;
        let mut closing = self.close_signal.subscribe();

        let read = timeout_at(deadline, async {
            let mut guard = self.stream.lock().await;
            let stream = guard.as_mut().ok_or(Error::ConnectionClosed)?;
            next_text(stream).await
        });

        let result = tokio::select! {
            biased;
            () = closed(&mut closing) => return Err(Error::ConnectionClosed),
            result = read => result,
        };

        match result {
            Ok(Ok(text)) => {
                trace!(conn_id = %self.id, len = text.len(), "Message received");
                Ok(text)
            }
            Ok(Err(e)) => {
                if e.is_protocol_violation() {
                    warn!(conn_id = %self.id, error = %e, "Rejected inbound frame");
                }
                Err(e)
            }
            Err(_) => Err(Error::timeout("read", duration_ms(receive_timeout))),
        }
    }

    /// Writes one text message.
    ///
    /// The frame is written and then flushed; the first failure of either
    /// step is returned and the message must be treated as not delivered.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the send deadline elapses
    /// - [`Error::ConnectionClosed`] if closed locally
    /// - [`Error::WebSocket`] if the write or flush fails
    pub async fn write_message(&self, text: &str) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let send_timeout = self.config.send_timeout;
        let deadline = Instant::now() + send_timeout;
        let mut closing = self.close_signal.subscribe();

        let write = timeout_at(deadline, async {
            let mut guard = self.sink.lock().await;
            let sink = guard.as_mut().ok_or(Error::ConnectionClosed)?;

            sink.feed(Message::text(text.to_owned()))
                .await
                .inspect_err(|e| debug!(conn_id = %self.id, error = %e, "Frame write failed"))?;

            sink.flush()
                .await
                .inspect_err(|e| debug!(conn_id = %self.id, error = %e, "Frame flush failed"))?;

            Ok::<(), Error>(())
        });

        let result = tokio::select! {
            biased;
            () = closed(&mut closing) => return Err(Error::ConnectionClosed),
            result = write => result,
        };

        match result {
            Ok(Ok(())) => {
                trace!(conn_id = %self.id, len = text.len(), "Message sent");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::timeout("write", duration_ms(send_timeout))),
        }
    }

    /// Closes the connection.
    ///
    /// On the first call, pending reads and writes fail with
    /// [`Error::ConnectionClosed`], a close frame is sent and the socket is
    /// released. Later calls do nothing. Errors while closing are logged
    /// and dropped.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        // Pending calls drop their lock guards once woken
        self.close_signal.send_replace(true);

        let sink = self.sink.lock().await.take();
        if let Some(mut sink) = sink {
            match timeout(self.config.send_timeout, sink.close()).await {
                Ok(Ok(())) => debug!(conn_id = %self.id, "Close frame sent"),
                Ok(Err(e)) => debug!(conn_id = %self.id, error = %e, "Close frame not sent"),
                Err(_) => debug!(conn_id = %self.id, "Close timed out"),
            }
        }

        drop(self.stream.lock().await.take());
        debug!(conn_id = %self.id, "Connection closed");
    }

    /// Returns the heartbeat `(interval, timeout)` from the config.
    #[inline]
    #[must_use]
    pub fn ping_params(&self) -> (Duration, Duration) {
        (self.config.ping_interval, self.config.ping_timeout)
    }
}

/// Resolves once the close signal is set.
async fn closed(signal: &mut watch::Receiver<bool>) {
    while !*signal.borrow_and_update() {
        if signal.changed().await.is_err() {
            return;
        }
    }
}

/// Pulls frames until a data frame arrives.
async fn next_text(stream: &mut SplitStream<WsSocket>) -> Result<String> {
    loop {
        let message = match stream.next().await {
            Some(Ok(message)) => message,
            Some(Err(WsError::Utf8(_) | WsError::Capacity(_))) => return Err(Error::BadBuffer),
            Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                return Err(Error::ConnectionClosed);
            }
            Some(Err(e)) => return Err(Error::WebSocket(e)),
        };

        match message {
            Message::Text(text) => {
                if text.as_str().is_empty() {
                    return Err(Error::PacketWrong);
                }
                return Ok(text.as_str().to_owned());
            }
            Message::Binary(_) => return Err(Error::BinaryMessage),
            Message::Close(_) => return Err(Error::ConnectionClosed),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }
}

impl fmt::Debug for WebsocketConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebsocketConnection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection Trait
// ============================================================================

#[async_trait]
impl Connection for WebsocketConnection {
    async fn read_message(&self) -> Result<String> {
        WebsocketConnection::read_message(self).await
    }

    async fn write_message(&self, text: &str) -> Result<()> {
        WebsocketConnection::write_message(self, text).await
    }

    async fn close(&self) {
        WebsocketConnection::close(self).await;
    }

    fn ping_params(&self) -> (Duration, Duration) {
        WebsocketConnection::ping_params(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
