//! WebSocket push session lifecycle, from upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use hookrelay_core::{epoch_ms, ConnectionId, Envelope, EnvelopeKind};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::metrics::{
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_CONNECTION_DURATION_SECONDS,
    WS_DISCONNECTIONS_TOTAL,
};
use crate::store::ResultStore;

use super::broadcast::BroadcastManager;
use super::connection::ClientConnection;

/// Outbound queue depth per connection.
const OUTBOUND_QUEUE: usize = 64;

/// Heartbeat timing for a push session.
#[derive(Clone, Copy, Debug)]
pub struct Heartbeat {
    /// Interval between server-initiated Ping frames.
    pub ping_interval: Duration,
    /// Silence window after which the client is considered dead.
    pub pong_timeout: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(60),
        }
    }
}

/// Run a push session for a connected client.
///
/// 1. Registers the connection with the broadcaster
/// 2. Sends the currently held result (if any) so a late joiner catches up
/// 3. Forwards broadcast envelopes via the outbound queue
/// 4. Answers client JSON pings with JSON pongs carrying server time
/// 5. Sends periodic Ping frames and disconnects unresponsive clients
/// 6. Deregisters on disconnect or shutdown
#[instrument(skip_all, fields(conn_id = %connection_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    connection_id: ConnectionId,
    store: Arc<ResultStore>,
    broadcast: Arc<BroadcastManager>,
    heartbeat: Heartbeat,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
    let connection = Arc::new(ClientConnection::new(connection_id.clone(), send_tx));

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    broadcast.add(connection.clone()).await;

    // Catch-up: a client that connects after the result landed still gets it.
    // Queued before the outbound task starts draining, so it precedes any
    // concurrent broadcast.
    let snapshot = store.snapshot();
    if let Some(result) = snapshot.result {
        debug!(timestamp = snapshot.timestamp, "sending held result to late joiner");
        let _ = connection.send_envelope(&Envelope::result(&result, snapshot.timestamp));
    }

    // Outbound forwarder with periodic Ping frames and pong-timeout check.
    let outbound_conn = connection.clone();
    let outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat.ping_interval);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    match frame {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > heartbeat.pong_timeout
                    {
                        warn!(
                            conn_id = %outbound_conn.id,
                            "client unresponsive for {:?}, disconnecting",
                            heartbeat.pong_timeout
                        );
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Inbound loop.
    let reason = loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            () = shutdown.cancelled() => {
                info!("server shutting down, closing session");
                break "shutdown";
            }
        };
        let Some(Ok(msg)) = msg else {
            break "stream_end";
        };

        let text = match msg {
            Message::Text(ref t) => t.to_string(),
            Message::Close(_) => {
                info!("client sent close frame");
                break "client_close";
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                continue;
            }
            Message::Binary(_) => continue,
        };

        connection.mark_alive();
        match Envelope::parse(&text) {
            Some(envelope) => match envelope.kind() {
                EnvelopeKind::Ping => {
                    let pong = Envelope::pong(epoch_ms(), chrono::Utc::now().to_rfc3339());
                    if !connection.send_envelope(&pong) {
                        debug!("failed to enqueue pong");
                    }
                }
                EnvelopeKind::Pong => {}
                _ => debug!(len = text.len(), "ignoring unrecognized frame"),
            },
            None => debug!(len = text.len(), "ignoring non-envelope frame"),
        }
    };

    info!(reason, "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL, "reason" => reason).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
    outbound.abort();
    broadcast.remove(&connection_id).await;
}

#[cfg(test)]
mod tests {
    // Session behavior over a live socket is covered by tests/integration.rs.
    // Unit tests here validate the frame shapes the session emits.

    use super::*;

    #[test]
    fn default_heartbeat_timing() {
        let hb = Heartbeat::default();
        assert_eq!(hb.ping_interval, Duration::from_secs(30));
        assert_eq!(hb.pong_timeout, Duration::from_secs(60));
    }

    #[test]
    fn pong_reply_shape() {
        let pong = Envelope::pong(1234, "2026-08-26T00:00:00Z".to_string());
        let json = serde_json::to_value(&pong).unwrap();
        assert_eq!(json["type"], "pong");
        assert_eq!(json["timestamp"], 1234);
        assert_eq!(json["serverTime"], "2026-08-26T00:00:00Z");
    }

    #[test]
    fn ping_frames_are_recognized() {
        let envelope = Envelope::parse(r#"{"type":"ping","timestamp":99}"#).unwrap();
        assert!(matches!(envelope.kind(), EnvelopeKind::Ping));
    }
}
