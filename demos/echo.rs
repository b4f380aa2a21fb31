//! Echo server with a caller-driven heartbeat.
//!
//! Demonstrates:
//! - Accepting upgrades with `Listener` + `handle_connection`
//! - Dialing with `connect`
//! - Driving application-level pings from `ping_params`
//!
//! Usage:
//!   cargo run --example echo
//!   cargo run --example echo -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use ws_duplex::{
    Connection, Listener, RequestContext, Result, TransportConfig, WebsocketTransport,
};

// ============================================================================
// Constants
// ============================================================================

const HEARTBEATS: u32 = 3;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let debug = std::env::args().any(|a| a == "--debug");
    init_logging(debug);

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let filter = if debug { "ws_duplex=trace" } else { "ws_duplex=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

async fn run() -> Result<()> {
    println!("=== Echo ===\n");

    let config = TransportConfig::new()
        .with_ping_interval(Duration::from_millis(500))
        .with_ping_timeout(Duration::from_secs(2));
    let transport = WebsocketTransport::new(config)?;

    // ========================================================================
    // Server
    // ========================================================================

    let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
    let url = listener.ws_url();
    println!("[Server] Listening on {url}");

    {
        let transport = transport.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let transport = transport.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_peer(&transport, stream).await {
                        println!("[Server] Peer ended: {e}");
                    }
                });
            }
        });
    }

    // ========================================================================
    // Client
    // ========================================================================

    let conn: Arc<dyn Connection> = Arc::new(transport.connect(&url).await?);
    println!("[Client] Connected");

    conn.write_message("ping-1").await?;
    println!("[Client] Echo: {}", conn.read_message().await?);

    // ========================================================================
    // Heartbeat
    // ========================================================================

    let (interval, timeout) = conn.ping_params();
    println!("[Heartbeat] interval={interval:?} timeout={timeout:?}");

    let mut ticker = tokio::time::interval(interval);
    for n in 1..=HEARTBEATS {
        ticker.tick().await;
        conn.write_message(&format!("heartbeat-{n}")).await?;

        match tokio::time::timeout(timeout, conn.read_message()).await {
            Ok(Ok(reply)) => println!("[Heartbeat] {reply}"),
            Ok(Err(e)) => {
                conn.close().await;
                return Err(e);
            }
            Err(_) => {
                println!("[Heartbeat] No reply within {timeout:?}, closing");
                conn.close().await;
                return Ok(());
            }
        }
    }

    conn.close().await;
    println!("\n[Client] Closed");
    Ok(())
}

/// Echoes every text message until the peer goes away.
async fn serve_peer(transport: &WebsocketTransport, stream: tokio::net::TcpStream) -> Result<()> {
    let request = RequestContext::read(stream).await?;
    let conn = transport.handle_connection(request).await?;

    loop {
        let message = conn.read_message().await?;
        conn.write_message(&message).await?;
    }
}
