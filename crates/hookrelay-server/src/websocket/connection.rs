//! Per-client WebSocket connection state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use hookrelay_core::{ConnectionId, Envelope};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// A connected push client.
///
/// Outbound frames go through a bounded channel to the connection's write
/// task. `try_send` keeps a slow client from stalling the broadcaster; a
/// full queue drops the frame and bumps the drop counter instead.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Send channel to the connection's WebSocket write task.
    tx: mpsc::Sender<String>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has responded since the last heartbeat check.
    pub is_alive: AtomicBool,
    /// When the last pong (or any inbound activity) was seen.
    last_pong: Mutex<Instant>,
    /// Frames dropped due to a full outbound queue.
    pub dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection.
    #[must_use]
    pub fn new(id: ConnectionId, tx: mpsc::Sender<String>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Send a text frame to the client.
    ///
    /// Returns `false` if the queue is full or closed, and increments the
    /// dropped frame counter.
    pub fn send(&self, frame: String) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize an envelope and send it to the client.
    pub fn send_envelope(&self, envelope: &Envelope) -> bool {
        match serde_json::to_string(envelope) {
            Ok(json) => self.send(json),
            Err(_) => false,
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Whether the outbound queue has been closed (write task gone).
    pub fn tx_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Mark the connection as alive (pong or inbound frame received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for the heartbeat sweep.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
