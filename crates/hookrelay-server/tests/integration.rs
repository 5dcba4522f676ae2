//! End-to-end tests using a real WebSocket client and HTTP requests
//! against a server bound to an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use hookrelay_server::config::ServerConfig;
use hookrelay_server::server::RelayServer;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Boot a test server on an ephemeral port, returning its base URLs.
async fn boot_server() -> (String, String, Arc<RelayServer>) {
    let config = ServerConfig::default(); // port 0 = auto-assign
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .build_recorder()
        .handle();
    let server = Arc::new(RelayServer::new(config, metrics_handle));

    let (addr, _handle) = server.listen().await.unwrap();
    let http_url = format!("http://{addr}");
    let ws_url = format!("ws://{addr}/ws");

    (http_url, ws_url, server)
}

async fn connect_ws(ws_url: &str) -> WsStream {
    let (ws, _) = timeout(TIMEOUT, connect_async(ws_url)).await.unwrap().unwrap();
    ws
}

/// Read frames until a text frame arrives, answering protocol pings.
async fn next_text(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(payload) => {
                ws.send(Message::Pong(payload)).await.unwrap();
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn callback_is_pushed_to_connected_client() {
    let (http_url, ws_url, _server) = boot_server().await;
    let mut ws = connect_ws(&ws_url).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{http_url}/api/webhook-result"))
        .json(&json!({"result": "Turmeric pairs well with saffron."}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let frame = next_text(&mut ws).await;
    assert_eq!(frame["result"], "Turmeric pairs well with saffron.");
    assert!(frame["timestamp"].is_number());
}

#[tokio::test]
async fn late_joiner_receives_held_result() {
    let (http_url, ws_url, _server) = boot_server().await;

    let client = reqwest::Client::new();
    client
        .post(format!("{http_url}/api/webhook-result"))
        .json(&json!({"result": "already here"}))
        .send()
        .await
        .unwrap();

    // Connect after the result landed.
    let mut ws = connect_ws(&ws_url).await;
    let frame = next_text(&mut ws).await;
    assert_eq!(frame["result"], "already here");
}

#[tokio::test]
async fn clear_is_broadcast() {
    let (http_url, ws_url, _server) = boot_server().await;

    let client = reqwest::Client::new();
    client
        .post(format!("{http_url}/api/webhook-result"))
        .json(&json!({"result": "to be cleared"}))
        .send()
        .await
        .unwrap();

    let mut ws = connect_ws(&ws_url).await;
    let first = next_text(&mut ws).await;
    assert_eq!(first["result"], "to be cleared");

    let resp = client
        .post(format!("{http_url}/api/clear-result"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let frame = next_text(&mut ws).await;
    assert_eq!(frame["cleared"], true);
}

#[tokio::test]
async fn broadcast_reaches_every_client() {
    let (http_url, ws_url, _server) = boot_server().await;
    let mut ws1 = connect_ws(&ws_url).await;
    let mut ws2 = connect_ws(&ws_url).await;

    let client = reqwest::Client::new();
    client
        .post(format!("{http_url}/api/webhook-result"))
        .json(&json!({"result": "fan-out"}))
        .send()
        .await
        .unwrap();

    let f1 = next_text(&mut ws1).await;
    let f2 = next_text(&mut ws2).await;
    assert_eq!(f1["result"], "fan-out");
    assert_eq!(f2["result"], "fan-out");
}

#[tokio::test]
async fn json_ping_gets_pong_with_server_time() {
    let (_http_url, ws_url, _server) = boot_server().await;
    let mut ws = connect_ws(&ws_url).await;

    ws.send(Message::Text(
        json!({"type": "ping", "timestamp": 123}).to_string().into(),
    ))
    .await
    .unwrap();

    let frame = next_text(&mut ws).await;
    assert_eq!(frame["type"], "pong");
    assert!(frame["timestamp"].is_number());
    assert!(frame["serverTime"].is_string());
}

#[tokio::test]
async fn poll_tracks_push_state() {
    let (http_url, _ws_url, _server) = boot_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{http_url}/api/webhook-result"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "No result available yet. Please try again later.");

    client
        .post(format!("{http_url}/api/webhook-result"))
        .json(&json!({"result": "polled"}))
        .send()
        .await
        .unwrap();

    let resp = client
        .get(format!("{http_url}/api/webhook-result"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"], "polled");
    assert!(body["timestamp"].is_number());
}

#[tokio::test]
async fn health_counts_connections() {
    let (http_url, ws_url, _server) = boot_server().await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("{http_url}/api/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 0);

    let _ws = connect_ws(&ws_url).await;
    // Registration happens inside the session task after the upgrade.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let body: Value = client
        .get(format!("{http_url}/api/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["connections"], 1);
}

#[tokio::test]
async fn connection_limit_rejects_upgrade() {
    let config = ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    };
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .build_recorder()
        .handle();
    let server = RelayServer::new(config, metrics_handle);
    let (addr, _handle) = server.listen().await.unwrap();
    let ws_url = format!("ws://{addr}/ws");

    let _first = connect_ws(&ws_url).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = timeout(TIMEOUT, connect_async(&ws_url)).await.unwrap();
    assert!(second.is_err());
}

#[tokio::test]
async fn disconnect_deregisters_client() {
    let (http_url, ws_url, server) = boot_server().await;
    let ws = connect_ws(&ws_url).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.broadcast().connection_count().await, 1);

    drop(ws);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.broadcast().connection_count().await, 0);

    // A post-disconnect callback still stores fine.
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{http_url}/api/webhook-result"))
        .json(&json!({"result": "nobody listening"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn shutdown_closes_sessions() {
    let (_http_url, ws_url, server) = boot_server().await;
    let mut ws = connect_ws(&ws_url).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    server.shutdown().shutdown();

    // The session ends; the client sees the stream close.
    let closed = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}
