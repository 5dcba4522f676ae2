//! Pure state machine behind the durable channel.
//!
//! Everything time- and socket-free lives here: connection status,
//! reconnect attempt counting, and duplicate suppression. The async driver
//! in [`crate::channel`] feeds it socket events and acts on its decisions.

use std::time::Duration;

use hookrelay_core::{Envelope, EnvelopeKind, ReconnectPolicy};

/// Connectivity of the push channel as seen by the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Not connected and not currently trying.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Live and receiving broadcasts.
    Connected,
    /// The socket just failed; a retry decision follows immediately.
    Error,
    /// Automatic retries exhausted; waiting for a manual reconnect.
    GaveUp,
}

/// What to do after the socket closed or failed to open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseDecision {
    /// Wait this long, then try again.
    RetryAfter(Duration),
    /// Retries exhausted (or disabled); stay down until told otherwise.
    GiveUp,
}

/// A deliverable event decoded from a broadcast frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// A new result arrived.
    Result {
        /// The result text.
        text: String,
        /// Server stamp in epoch milliseconds.
        timestamp: i64,
    },
    /// The held result was cleared.
    Cleared {
        /// Server stamp in epoch milliseconds.
        timestamp: i64,
    },
}

/// State machine for one durable channel.
#[derive(Debug)]
pub struct ChannelState {
    policy: ReconnectPolicy,
    status: ChannelStatus,
    attempts: u32,
    /// Value of the last delivered result, for duplicate suppression:
    /// catch-up replays after a reconnect and repeated identical
    /// callbacks both carry the same value.
    last_delivered: Option<String>,
}

impl ChannelState {
    /// Create a fresh disconnected channel state.
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            status: ChannelStatus::Disconnected,
            attempts: 0,
            last_delivered: None,
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ChannelStatus {
        self.status
    }

    /// Failed attempts since the last successful open.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// A connection attempt is starting.
    pub fn on_connecting(&mut self) {
        self.status = ChannelStatus::Connecting;
    }

    /// The socket opened; the attempt counter resets.
    pub fn on_open(&mut self) {
        self.status = ChannelStatus::Connected;
        self.attempts = 0;
    }

    /// The socket failed; surfaced before the retry decision.
    pub fn on_error(&mut self) {
        self.status = ChannelStatus::Error;
    }

    /// The socket closed or the connect attempt failed.
    pub fn on_close(&mut self) -> CloseDecision {
        if self.policy.should_retry(self.attempts) {
            let delay = self.policy.delay(self.attempts);
            self.attempts += 1;
            self.status = ChannelStatus::Disconnected;
            CloseDecision::RetryAfter(delay)
        } else {
            self.status = if self.policy.auto_reconnect {
                ChannelStatus::GaveUp
            } else {
                ChannelStatus::Disconnected
            };
            CloseDecision::GiveUp
        }
    }

    /// An inbound text frame arrived. Returns a delivery if the frame is
    /// a broadcast the application has not seen yet.
    ///
    /// Control frames and malformed input produce nothing. A result frame
    /// carrying the same value as the last delivered one is suppressed,
    /// whatever its stamp: it is either the catch-up replay after a
    /// reconnect or a repeated callback from the sink.
    pub fn on_frame(&mut self, text: &str) -> Option<Delivery> {
        let envelope = Envelope::parse(text)?;
        match envelope.kind() {
            EnvelopeKind::Result(result) => {
                if self.last_delivered.as_deref() == Some(result) {
                    return None;
                }
                self.last_delivered = Some(result.to_owned());
                Some(Delivery::Result {
                    text: result.to_owned(),
                    timestamp: envelope.timestamp,
                })
            }
            EnvelopeKind::Cleared => {
                // A clear with nothing delivered is a no-op for the app.
                self.last_delivered.take().map(|_| Delivery::Cleared {
                    timestamp: envelope.timestamp,
                })
            }
            EnvelopeKind::Ping | EnvelopeKind::Pong | EnvelopeKind::Unknown => None,
        }
    }

    /// A manual reconnect was requested: reset the attempt budget and the
    /// dedup record, so the catch-up send is delivered again.
    pub fn on_manual_reconnect(&mut self) {
        self.attempts = 0;
        self.status = ChannelStatus::Disconnected;
        self.last_delivered = None;
    }

    /// Drop the dedup record so the next identical frame is delivered.
    pub fn forget_last_message(&mut self) {
        self.last_delivered = None;
    }
}
