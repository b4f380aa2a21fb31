//! In-flight HTTP upgrade request.
//!
//! A [`RequestContext`] holds the parsed request head of an inbound
//! HTTP/1.1 request together with the TCP stream it arrived on. It is the
//! server-side input of [`WebsocketTransport::handle_connection`] and is
//! also used to write rejection responses back to the peer.
//!
//! [`WebsocketTransport::handle_connection`]: super::WebsocketTransport::handle_connection

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::http::{HeaderMap, Method, Request, StatusCode, Uri};
use tracing::trace;

use crate::error::{Error, Result};

use super::config::duration_ms;

// ============================================================================
// Constants
// ============================================================================

/// Maximum size of a request head.
const MAX_HEAD_SIZE: usize = 8192;

/// Maximum number of request headers.
const MAX_HEADERS: usize = 64;

/// Time allowed for the peer to send its request head.
const REQUEST_HEAD_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// RequestContext
// ============================================================================

/// An inbound HTTP request awaiting upgrade.
#[derive(Debug)]
pub struct RequestContext {
    /// Stream the request arrived on.
    stream: TcpStream,
    /// Remote address.
    peer_addr: SocketAddr,
    /// Parsed request head.
    request: Request<()>,
}

impl RequestContext {
    /// Reads and parses a request head from a freshly accepted stream.
    ///
    /// The head is read byte by byte so that nothing past the blank line
    /// is consumed from the stream.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the head does not arrive within 10s
    /// - [`Error::Protocol`] if the head is malformed, too large or truncated
    /// - [`Error::Io`] if reading fails
    pub async fn read(mut stream: TcpStream) -> Result<Self> {
        let peer_addr = stream.peer_addr()?;

        let head = timeout(REQUEST_HEAD_TIMEOUT, read_head(&mut stream))
            .await
            .map_err(|_| Error::timeout("request head", duration_ms(REQUEST_HEAD_TIMEOUT)))??;

        let request = parse_head(&head)?;
        trace!(%peer_addr, method = %request.method(), uri = %request.uri(), "Request head parsed");

        Ok(Self {
            stream,
            peer_addr,
            request,
        })
    }

    /// Returns the request method.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// Returns the request URI.
    #[inline]
    #[must_use]
    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    /// Returns the request headers.
    #[inline]
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// Returns the remote address.
    #[inline]
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Writes a plain-text response and flushes it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if writing fails.
    pub async fn respond_error(&mut self, status: StatusCode, body: &str) -> Result<()> {
        let response = format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             X-Content-Type-Options: nosniff\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n\
             {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            body.len(),
            body
        );

        self.stream.write_all(response.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Writes the `101 Switching Protocols` response.
    pub(crate) async fn respond_switching_protocols(&mut self, accept_key: &str) -> Result<()> {
        let response = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Connection: Upgrade\r\n\
             Upgrade: websocket\r\n\
             Sec-WebSocket-Accept: {accept_key}\r\n\
             \r\n"
        );

        self.stream.write_all(response.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Releases the underlying stream.
    #[inline]
    pub(crate) fn into_stream(self) -> TcpStream {
        self.stream
    }
}

// ============================================================================
// Head Parsing
// ============================================================================

/// Reads until the blank line terminating the request head.
async fn read_head(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(1024);

    while !buffer.ends_with(b"\r\n\r\n") {
        if buffer.len() >= MAX_HEAD_SIZE {
            return Err(Error::protocol("HTTP request head too large"));
        }

        let mut byte = [0u8; 1];
        if stream.read(&mut byte).await? == 0 {
            return Err(Error::protocol("Connection closed before request head completed"));
        }
        buffer.push(byte[0]);
    }

    Ok(buffer)
}

/// Parses a complete request head into an `http::Request`.
fn parse_head(head: &[u8]) -> Result<Request<()>> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut headers);

    match parsed.parse(head) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => {
            return Err(Error::protocol("Incomplete HTTP request"));
        }
        Err(e) => {
            return Err(Error::protocol(format!("Failed to parse HTTP request: {e}")));
        }
    }

    let method = parsed
        .method
        .ok_or_else(|| Error::protocol("No method"))?;
    let path = parsed.path.ok_or_else(|| Error::protocol("No path"))?;

    let mut builder = Request::builder().method(method).uri(path);
    for header in parsed.headers.iter() {
        builder = builder.header(header.name, header.value);
    }

    builder
        .body(())
        .map_err(|e| Error::protocol(format!("Invalid HTTP request: {e}")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;

    /// Sends `raw` from a client and returns the server-side context.
    async fn context_from(raw: &'static [u8]) -> (Result<RequestContext>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let mut client = TcpStream::connect(addr).await.expect("connect");
        client.write_all(raw).await.expect("client write");

        let (stream, _) = listener.accept().await.expect("accept");
        (RequestContext::read(stream).await, client)
    }

    #[test]
    fn test_parse_head() {
        let request = parse_head(
            b"GET /ws?x=1 HTTP/1.1\r\nHost: localhost\r\nUpgrade: websocket\r\n\r\n",
        )
        .expect("parse");

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.uri().path(), "/ws");
        assert_eq!(request.uri().query(), Some("x=1"));
        assert_eq!(request.headers().get("upgrade").unwrap(), "websocket");
    }

    #[test]
    fn test_parse_head_malformed() {
        let result = parse_head(b"NOT A REQUEST\r\n\r\n");
        assert!(matches!(result, Err(Error::Protocol { .. })));
    }

    #[tokio::test]
    async fn test_read_context() {
        let (context, _client) =
            context_from(b"POST /submit HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        let context = context.expect("context");

        assert_eq!(context.method(), Method::POST);
        assert_eq!(context.uri().path(), "/submit");
        assert!(context.peer_addr().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_read_truncated() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let mut client = TcpStream::connect(addr).await.expect("connect");
        client.write_all(b"GET / HTTP/1.1\r\n").await.expect("write");
        drop(client);

        let (stream, _) = listener.accept().await.expect("accept");
        let result = RequestContext::read(stream).await;
        assert!(matches!(result, Err(Error::Protocol { .. })));
    }

    #[tokio::test]
    async fn test_respond_error() {
        let (context, mut client) =
            context_from(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        let mut context = context.expect("context");

        context
            .respond_error(StatusCode::SERVICE_UNAVAILABLE, "down\n")
            .await
            .expect("respond");
        drop(context);

        let mut response = String::new();
        client.read_to_string(&mut response).await.expect("read");

        assert!(response.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
        assert!(response.contains("Content-Length: 5\r\n"));
        assert!(response.ends_with("\r\n\r\ndown\n"));
    }
}
