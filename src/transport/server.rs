//! TCP listener for inbound upgrade requests.
//!
//! # Connection Flow
//!
//! 1. `Listener::bind` - Bind to an address (port 0 picks a random port)
//! 2. `Listener::accept` - Accept a TCP stream
//! 3. `RequestContext::read` - Parse the HTTP request head
//! 4. `WebsocketTransport::handle_connection` - Upgrade to a connection
//!
//! [`Listener::accept_request`] combines steps 2 and 3 for callers that
//! handle one peer at a time.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};

use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use crate::error::Result;

use super::request::RequestContext;

// ============================================================================
// Listener
// ============================================================================

/// A bound TCP listener that yields upgrade requests.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use ws_duplex::{Listener, RequestContext, WebsocketTransport};
///
/// let transport = WebsocketTransport::default();
/// let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
///
/// loop {
///     let (stream, _) = listener.accept().await?;
///     let transport = transport.clone();
///     tokio::spawn(async move {
///         let request = RequestContext::read(stream).await?;
///         let conn = transport.handle_connection(request).await?;
///         // drive conn...
///         Ok::<_, ws_duplex::Error>(())
///     });
/// }
/// ```
#[derive(Debug)]
pub struct Listener {
    /// TCP listener for incoming connections.
    listener: TcpListener,
    /// Port the listener is bound to.
    port: u16,
}

impl Listener {
    /// Binds to the specified address and port.
    ///
    /// Use port 0 to let the OS assign a random available port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let addr = SocketAddr::new(ip, port);
        let listener = TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        debug!(port = actual_port, "Listener bound");

        Ok(Self {
            listener,
            port: actual_port,
        })
    }

    /// Returns the port the listener is bound to.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the local socket address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the address is unavailable.
    #[inline]
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Returns the WebSocket URL for this listener.
    ///
    /// Format: `ws://{ip}:{port}`
    #[must_use]
    pub fn ws_url(&self) -> String {
        match self.listener.local_addr() {
            Ok(addr) => format!("ws://{addr}"),
            Err(_) => format!("ws://127.0.0.1:{}", self.port),
        }
    }

    /// Accepts the next TCP stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if accepting fails.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await?;
        debug!(?addr, "TCP connection accepted");
        Ok((stream, addr))
    }

    /// Accepts the next TCP stream and reads its request head.
    ///
    /// # Errors
    ///
    /// See [`accept`](Self::accept) and [`RequestContext::read`].
    pub async fn accept_request(&self) -> Result<RequestContext> {
        let (stream, _) = self.accept().await?;
        RequestContext::read(stream).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_bind_random_port() {
        let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed");

        assert!(listener.port() > 0);
        assert_eq!(
            listener.ws_url(),
            format!("ws://127.0.0.1:{}", listener.port())
        );
    }

    #[tokio::test]
    async fn test_local_addr() {
        let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed");

        let addr = listener.local_addr().expect("local addr");
        assert_eq!(addr.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(addr.port(), listener.port());
    }

    #[tokio::test]
    async fn test_accept_request() {
        let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed");
        let addr = listener.local_addr().expect("local addr");

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.expect("connect");
            stream
                .write_all(b"GET /chat HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .expect("write");
            stream
        });

        let request = listener.accept_request().await.expect("request");
        assert_eq!(request.uri().path(), "/chat");

        let _ = client.await;
    }
}
