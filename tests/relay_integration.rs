//! End-to-end tests for the relay: real HTTP ingress, real WebSocket
//! sessions, real fan-out.
//!
//! Each test boots the full router on an ephemeral port, connects viewers
//! with a raw WebSocket client, and drives scans through `POST /scan`.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use scan_relay::adapters::http::{app_router, AppState};
use scan_relay::client::{FeedEvent, ReconnectContext, ScanFeed};
use scan_relay::config::ServerConfig;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Boot the relay on an ephemeral port and return its address.
async fn start_relay() -> SocketAddr {
    let state = AppState::new();
    let router = app_router(state, &ServerConfig::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });

    addr
}

/// Connect a viewer and consume the greeting frame.
///
/// The greeting is sent after the session is registered, so a viewer that
/// has seen it is guaranteed to be visible to subsequent broadcasts.
async fn connect_viewer(addr: SocketAddr) -> WsClient {
    let (mut ws, _response) = connect_async(format!("ws://{}/", addr))
        .await
        .expect("websocket handshake");

    let greeting = next_json(&mut ws).await;
    assert_eq!(greeting["type"], "connection");
    assert!(greeting["timestamp"].is_i64());

    ws
}

/// Receive the next text frame as JSON, with a timeout.
async fn next_json(ws: &mut WsClient) -> Value {
    loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("frame error");

        match frame {
            Message::Text(text) => return serde_json::from_str(&text).expect("frame is JSON"),
            // Heartbeat pings can interleave with broadcasts.
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}

async fn health(client: &reqwest::Client, addr: SocketAddr) -> Value {
    client
        .get(format!("http://{}/api/health", addr))
        .send()
        .await
        .expect("health request")
        .json()
        .await
        .expect("health json")
}

/// Poll `/api/health` until the connected-client count settles.
async fn wait_for_clients(client: &reqwest::Client, addr: SocketAddr, expected: usize) {
    for _ in 0..100 {
        let body = health(client, addr).await;
        if body["connectedClients"] == json!(expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("connectedClients never reached {}", expected);
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn plain_text_scan_reaches_every_open_viewer() {
    let addr = start_relay().await;
    let http = reqwest::Client::new();

    let mut viewer_a = connect_viewer(addr).await;
    let mut viewer_b = connect_viewer(addr).await;

    let response: Value = http
        .post(format!("http://{}/scan", addr))
        .header("content-type", "text/plain")
        .body("ABC123")
        .send()
        .await
        .expect("scan request")
        .json()
        .await
        .expect("scan response json");

    assert_eq!(response["success"], json!(true));
    assert_eq!(response["barcode"], json!("ABC123"));
    assert_eq!(response["clients"], json!(2));

    for viewer in [&mut viewer_a, &mut viewer_b] {
        let frame = next_json(viewer).await;
        assert_eq!(frame["type"], "barcode");
        assert_eq!(frame["barcode"], "ABC123");
        assert!(frame["timestamp"].is_i64());
    }
}

#[tokio::test]
async fn json_barcode_field_is_trimmed() {
    let addr = start_relay().await;
    let http = reqwest::Client::new();

    let mut viewer = connect_viewer(addr).await;

    let response: Value = http
        .post(format!("http://{}/scan", addr))
        .json(&json!({ "barcode": " XYZ9 " }))
        .send()
        .await
        .expect("scan request")
        .json()
        .await
        .expect("scan response json");

    assert_eq!(response["barcode"], json!("XYZ9"));

    let frame = next_json(&mut viewer).await;
    assert_eq!(frame["barcode"], "XYZ9");
}

#[tokio::test]
async fn closed_viewer_is_pruned_and_broadcast_reaches_the_rest() {
    let addr = start_relay().await;
    let http = reqwest::Client::new();

    let mut survivor = connect_viewer(addr).await;
    let mut doomed = connect_viewer(addr).await;
    wait_for_clients(&http, addr, 2).await;

    doomed.close(None).await.expect("close");
    drop(doomed);
    wait_for_clients(&http, addr, 1).await;

    let response: Value = http
        .post(format!("http://{}/scan", addr))
        .header("content-type", "text/plain")
        .body("SURVIVOR1")
        .send()
        .await
        .expect("scan request")
        .json()
        .await
        .expect("scan response json");
    assert_eq!(response["clients"], json!(1));

    let frame = next_json(&mut survivor).await;
    assert_eq!(frame["barcode"], "SURVIVOR1");

    let body = health(&http, addr).await;
    assert_eq!(body["connectedClients"], json!(1));
}

#[tokio::test]
async fn scan_with_zero_viewers_still_succeeds() {
    let addr = start_relay().await;
    let http = reqwest::Client::new();

    let response: Value = http
        .post(format!("http://{}/scan", addr))
        .header("content-type", "text/plain")
        .body("NOBODY")
        .send()
        .await
        .expect("scan request")
        .json()
        .await
        .expect("scan response json");

    assert_eq!(response["success"], json!(true));
    assert_eq!(response["clients"], json!(0));
}

#[tokio::test]
async fn test_scan_endpoint_uses_the_same_pipeline() {
    let addr = start_relay().await;
    let http = reqwest::Client::new();

    let mut viewer = connect_viewer(addr).await;

    // Explicit barcode.
    let response: Value = http
        .post(format!("http://{}/api/test-scan", addr))
        .json(&json!({ "barcode": "B1" }))
        .send()
        .await
        .expect("test-scan request")
        .json()
        .await
        .expect("test-scan json");
    assert_eq!(response, json!({ "success": true, "barcode": "B1" }));
    assert_eq!(next_json(&mut viewer).await["barcode"], "B1");

    // Defaulted barcode.
    let response: Value = http
        .post(format!("http://{}/api/test-scan", addr))
        .json(&json!({}))
        .send()
        .await
        .expect("test-scan request")
        .json()
        .await
        .expect("test-scan json");
    let barcode = response["barcode"].as_str().expect("barcode string");
    assert!(barcode.starts_with("TEST"));
    assert_eq!(next_json(&mut viewer).await["barcode"], barcode);
}

#[tokio::test]
async fn health_reports_status_and_uptime() {
    let addr = start_relay().await;
    let http = reqwest::Client::new();

    let body = health(&http, addr).await;

    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["connectedClients"], json!(0));
    assert!(body["timestamp"].is_i64());
    assert!(body["uptime"].as_f64().expect("uptime") >= 0.0);
}

#[tokio::test]
async fn scan_feed_receives_events_end_to_end() {
    let addr = start_relay().await;
    let http = reqwest::Client::new();

    let (handle, mut events) = ScanFeed::spawn(format!("ws://{}/", addr));

    match tokio::time::timeout(RECV_TIMEOUT, events.recv()).await {
        Ok(Some(FeedEvent::Connected)) => {}
        other => panic!("unexpected event: {:?}", other),
    }
    wait_for_clients(&http, addr, 1).await;

    http.post(format!("http://{}/scan", addr))
        .header("content-type", "text/plain")
        .body("FEED42")
        .send()
        .await
        .expect("scan request");

    match tokio::time::timeout(RECV_TIMEOUT, events.recv()).await {
        Ok(Some(FeedEvent::Scan(event))) => assert_eq!(event.barcode, "FEED42"),
        other => panic!("unexpected event: {:?}", other),
    }

    // Intentional teardown: the feed must go away without reconnecting.
    handle.shutdown().await;
    wait_for_clients(&http, addr, 0).await;
}

#[tokio::test]
async fn manual_reconnect_reestablishes_the_channel() {
    let addr = start_relay().await;
    let http = reqwest::Client::new();

    // Short backoff so an accidental retry cannot stall the test.
    let ctx = ReconnectContext::new(3, Duration::from_millis(10), Duration::from_millis(20));
    let (handle, mut events) = ScanFeed::spawn_with_context(format!("ws://{}/", addr), ctx);

    match tokio::time::timeout(RECV_TIMEOUT, events.recv()).await {
        Ok(Some(FeedEvent::Connected)) => {}
        other => panic!("unexpected event: {:?}", other),
    }
    wait_for_clients(&http, addr, 1).await;

    // Manual reconnect tears the channel down and comes back as a fresh
    // session without counting against the retry budget.
    handle.reconnect_now();
    match tokio::time::timeout(RECV_TIMEOUT, events.recv()).await {
        Ok(Some(FeedEvent::Connected)) => {}
        other => panic!("unexpected event: {:?}", other),
    }

    handle.shutdown().await;
}
