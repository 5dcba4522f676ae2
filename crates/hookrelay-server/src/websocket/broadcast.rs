//! Envelope fan-out to connected push clients.

use std::collections::HashMap;
use std::sync::Arc;

use hookrelay_core::{ConnectionId, Envelope};
use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::metrics::{WS_BROADCASTS_TOTAL, WS_BROADCAST_DROPS_TOTAL};

use super::connection::ClientConnection;

/// Registry of connected clients and the fan-out path for envelopes.
pub struct BroadcastManager {
    /// Connected clients indexed by connection ID.
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl BroadcastManager {
    /// Create a new broadcast manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Remove a connection by ID.
    pub async fn remove(&self, connection_id: &ConnectionId) {
        let mut conns = self.connections.write().await;
        let _ = conns.remove(connection_id);
    }

    /// Broadcast an envelope to every connected client.
    ///
    /// The envelope is serialized once and fanned out with `try_send`.
    /// Connections whose outbound queue is closed are evicted; a full
    /// queue only drops this one frame.
    ///
    /// Returns the number of clients the frame was queued for.
    pub async fn broadcast(&self, envelope: &Envelope) -> usize {
        let json = match serde_json::to_string(envelope) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "failed to serialize envelope");
                return 0;
            }
        };
        let kind = kind_label(envelope);
        counter!(WS_BROADCASTS_TOTAL, "kind" => kind).increment(1);

        let mut delivered = 0;
        let mut failed: Vec<ConnectionId> = Vec::new();
        {
            let conns = self.connections.read().await;
            debug!(kind, recipients = conns.len(), "broadcast envelope");
            for conn in conns.values() {
                if conn.send(json.clone()) {
                    delivered += 1;
                } else {
                    counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                    if conn.tx_closed() {
                        failed.push(conn.id.clone());
                    } else {
                        warn!(conn_id = %conn.id, "outbound queue full, frame dropped");
                    }
                }
            }
        }
        if !failed.is_empty() {
            let mut conns = self.connections.write().await;
            for id in failed {
                warn!(conn_id = %id, "evicting connection with closed queue");
                let _ = conns.remove(&id);
            }
        }
        delivered
    }

    /// Number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}

fn kind_label(envelope: &Envelope) -> &'static str {
    use hookrelay_core::EnvelopeKind;
    match envelope.kind() {
        EnvelopeKind::Result(_) => "result",
        EnvelopeKind::Cleared => "cleared",
        EnvelopeKind::Ping => "ping",
        EnvelopeKind::Pong => "pong",
        EnvelopeKind::Unknown => "unknown",
    }
}
