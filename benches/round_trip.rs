//! Echo round-trip benchmark suite.
//!
//! Measures one write + one read over a loopback connection against an
//! echoing server, for several payload sizes.
//!
//! Run with: cargo bench --bench round_trip
//! Results saved to: target/criterion/

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tokio::runtime::Runtime;
use ws_duplex::{Listener, WebsocketConnection, WebsocketTransport};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const PAYLOAD_SIZES: &[usize] = &[16, 1024, 16 * 1024];

// ============================================================================
// Setup
// ============================================================================

/// Starts an echo server and returns a connected client.
async fn echo_client() -> WebsocketConnection {
    let transport = WebsocketTransport::default();
    let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
        .await
        .expect("bind");
    let url = listener.ws_url();

    let server_transport = transport.clone();
    tokio::spawn(async move {
        let request = listener.accept_request().await.expect("request");
        let conn = server_transport
            .handle_connection(request)
            .await
            .expect("upgrade");
        while let Ok(message) = conn.read_message().await {
            if conn.write_message(&message).await.is_err() {
                break;
            }
        }
    });

    transport.connect(&url).await.expect("connect")
}

// ============================================================================
// Benchmark: Round Trip
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let client = Arc::new(rt.block_on(echo_client()));

    let mut group = c.benchmark_group("round_trip");

    for &size in PAYLOAD_SIZES {
        let payload = "x".repeat(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("echo", size), &payload, |b, payload| {
            b.to_async(&rt).iter(|| {
                let client = Arc::clone(&client);
                let payload = payload.clone();
                async move {
                    client.write_message(&payload).await.unwrap();
                    client.read_message().await.unwrap()
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_round_trip);
criterion_main!(benches);
