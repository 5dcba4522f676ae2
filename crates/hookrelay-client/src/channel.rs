//! Durable push channel: an auto-reconnecting WebSocket subscription.
//!
//! The driver task owns the socket and the [`ChannelState`] machine; the
//! application consumes [`ChannelUpdate`]s from a bounded queue and steers
//! the driver with commands (manual reconnect, forget-last-message).

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use hookrelay_core::{epoch_ms, Envelope, ReconnectPolicy};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::{ChannelState, ChannelStatus, CloseDecision, Delivery};

/// Interval between client-initiated JSON pings.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Update queue depth toward the application.
const UPDATE_QUEUE: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Events surfaced to the application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelUpdate {
    /// A broadcast worth showing: a new result or a clear.
    Delivery(Delivery),
    /// The channel's connectivity changed.
    Status(ChannelStatus),
}

#[derive(Debug)]
enum Command {
    Reconnect,
    ForgetLastMessage,
}

/// Why the in-socket session ended.
enum SessionEnd {
    SocketClosed,
    ForcedReconnect,
    Cancelled,
}

/// Handle to a running durable channel.
pub struct DurableChannel {
    updates: mpsc::Receiver<ChannelUpdate>,
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
}

impl DurableChannel {
    /// Open a durable channel to `ws_url` and start the driver task.
    ///
    /// The channel begins connecting immediately; consume [`Self::recv`]
    /// for deliveries and status changes.
    #[must_use]
    pub fn connect(ws_url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        let (update_tx, update_rx) = mpsc::channel(UPDATE_QUEUE);
        let (command_tx, command_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let driver = Driver {
            url: ws_url.into(),
            state: ChannelState::new(policy),
            updates: update_tx,
            commands: command_rx,
            cancel: cancel.clone(),
        };
        drop(tokio::spawn(driver.run()));

        Self {
            updates: update_rx,
            commands: command_tx,
            cancel,
        }
    }

    /// Receive the next update. Returns `None` after shutdown.
    pub async fn recv(&mut self) -> Option<ChannelUpdate> {
        self.updates.recv().await
    }

    /// Request an immediate reconnect, restoring the retry budget.
    ///
    /// This is how the application recovers a channel that gave up.
    pub async fn reconnect(&self) {
        let _ = self.commands.send(Command::Reconnect).await;
    }

    /// Drop the duplicate-suppression record, so the next frame is
    /// delivered even if identical to the last one.
    pub async fn forget_last_message(&self) {
        let _ = self.commands.send(Command::ForgetLastMessage).await;
    }

    /// Stop the driver and close the socket.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for DurableChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Driver {
    url: String,
    state: ChannelState,
    updates: mpsc::Sender<ChannelUpdate>,
    commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(mut self) {
        info!(url = %self.url, "durable channel starting");
        loop {
            self.state.on_connecting();
            if !self.emit_status().await {
                return;
            }

            let connected = tokio::select! {
                r = connect_async(self.url.as_str()) => r,
                () = self.cancel.cancelled() => break,
            };

            match connected {
                Ok((ws, _)) => {
                    self.state.on_open();
                    info!(attempts_reset = true, "push channel connected");
                    if !self.emit_status().await {
                        return;
                    }
                    match self.run_session(ws).await {
                        SessionEnd::Cancelled => break,
                        SessionEnd::ForcedReconnect => {
                            self.state.on_manual_reconnect();
                            continue;
                        }
                        SessionEnd::SocketClosed => {}
                    }
                }
                Err(e) => {
                    warn!(error = %e, "push channel connect failed");
                }
            }

            self.state.on_error();
            if !self.emit_status().await {
                return;
            }

            match self.state.on_close() {
                CloseDecision::RetryAfter(delay) => {
                    if !self.emit_status().await {
                        return;
                    }
                    debug!(
                        attempt = self.state.attempts(),
                        delay_ms = delay.as_millis(),
                        "reconnecting after backoff"
                    );
                    if !self.wait_out_backoff(delay).await {
                        break;
                    }
                }
                CloseDecision::GiveUp => {
                    warn!("push channel retries exhausted, waiting for manual reconnect");
                    if !self.emit_status().await {
                        return;
                    }
                    if !self.wait_for_manual_reconnect().await {
                        break;
                    }
                }
            }
        }

        let _ = self
            .emit(ChannelUpdate::Status(ChannelStatus::Disconnected))
            .await;
        info!("durable channel stopped");
    }

    /// One connected session. Returns why it ended.
    async fn run_session(&mut self, mut ws: WsStream) -> SessionEnd {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        // Skip the immediate first tick
        let _ = heartbeat.tick().await;

        loop {
            tokio::select! {
                msg = ws.next() => {
                    let Some(Ok(msg)) = msg else {
                        return SessionEnd::SocketClosed;
                    };
                    match msg {
                        Message::Text(text) => {
                            if let Some(delivery) = self.state.on_frame(&text) {
                                if !self.emit(ChannelUpdate::Delivery(delivery)).await {
                                    return SessionEnd::Cancelled;
                                }
                            }
                        }
                        Message::Ping(payload) => {
                            if ws.send(Message::Pong(payload)).await.is_err() {
                                return SessionEnd::SocketClosed;
                            }
                        }
                        Message::Close(_) => return SessionEnd::SocketClosed,
                        _ => {}
                    }
                }
                _ = heartbeat.tick() => {
                    let ping = match serde_json::to_string(&Envelope::ping(epoch_ms())) {
                        Ok(json) => json,
                        Err(_) => continue,
                    };
                    if ws.send(Message::Text(ping.into())).await.is_err() {
                        return SessionEnd::SocketClosed;
                    }
                }
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(Command::Reconnect) => {
                            let _ = ws.close(None).await;
                            return SessionEnd::ForcedReconnect;
                        }
                        Some(Command::ForgetLastMessage) => {
                            self.state.forget_last_message();
                        }
                        None => return SessionEnd::Cancelled,
                    }
                }
                () = self.cancel.cancelled() => {
                    let _ = ws.close(None).await;
                    return SessionEnd::Cancelled;
                }
            }
        }
    }

    /// Sleep out a backoff delay; a reconnect command skips the wait.
    /// Returns `false` on cancellation.
    async fn wait_out_backoff(&mut self, delay: Duration) -> bool {
        loop {
            tokio::select! {
                () = tokio::time::sleep(delay) => return true,
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(Command::Reconnect) => {
                            self.state.on_manual_reconnect();
                            return true;
                        }
                        Some(Command::ForgetLastMessage) => {
                            self.state.forget_last_message();
                        }
                        None => return false,
                    }
                }
                () = self.cancel.cancelled() => return false,
            }
        }
    }

    /// Block until a manual reconnect arrives. Returns `false` on
    /// cancellation.
    async fn wait_for_manual_reconnect(&mut self) -> bool {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(Command::Reconnect) => {
                            self.state.on_manual_reconnect();
                            return true;
                        }
                        Some(Command::ForgetLastMessage) => {
                            self.state.forget_last_message();
                        }
                        None => return false,
                    }
                }
                () = self.cancel.cancelled() => return false,
            }
        }
    }

    async fn emit_status(&self) -> bool {
        self.emit(ChannelUpdate::Status(self.state.status())).await
    }

    /// Returns `false` when the application dropped its receiver.
    async fn emit(&self, update: ChannelUpdate) -> bool {
        self.updates.send(update).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    // Live-socket behavior is covered by tests/channel_integration.rs
    // against a real relay server. Unit coverage for the reconnect and
    // dedup rules lives in crate::state.

    use super::*;

    #[test]
    fn heartbeat_matches_server_expectation() {
        // The server disconnects after 60s of silence; two heartbeats fit.
        assert!(HEARTBEAT_INTERVAL < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn unreachable_server_reports_connecting_then_disconnected() {
        let policy = ReconnectPolicy {
            base_interval_ms: 10,
            cap_ms: 20,
            max_attempts: 1,
            ..ReconnectPolicy::default()
        };
        // Port 1 is essentially never listening.
        let mut channel = DurableChannel::connect("ws://127.0.0.1:1/ws", policy);

        assert_eq!(
            channel.recv().await,
            Some(ChannelUpdate::Status(ChannelStatus::Connecting))
        );
        assert_eq!(
            channel.recv().await,
            Some(ChannelUpdate::Status(ChannelStatus::Error))
        );
        assert_eq!(
            channel.recv().await,
            Some(ChannelUpdate::Status(ChannelStatus::Disconnected))
        );
        // Second attempt, then the budget is spent.
        assert_eq!(
            channel.recv().await,
            Some(ChannelUpdate::Status(ChannelStatus::Connecting))
        );
        assert_eq!(
            channel.recv().await,
            Some(ChannelUpdate::Status(ChannelStatus::Error))
        );
        assert_eq!(
            channel.recv().await,
            Some(ChannelUpdate::Status(ChannelStatus::GaveUp))
        );
        channel.shutdown();
    }
}
