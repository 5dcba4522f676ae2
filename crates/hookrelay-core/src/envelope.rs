//! Wire envelope for the push channel.
//!
//! Every message on the WebSocket is a single JSON object with camelCase
//! keys. Exactly one of `result` / `cleared` is meaningful on a broadcast
//! message; `ping` / `pong` control messages are out of band from result
//! delivery and never touch the client's dedup state.

use serde::{Deserialize, Serialize};

/// Current wall-clock time as epoch milliseconds.
#[must_use]
pub fn epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// The tagged JSON payload sent over the push channel.
///
/// Serialized shapes on the wire:
///
/// - result:  `{"result":"...","timestamp":1700000000000}`
/// - cleared: `{"cleared":true,"timestamp":1700000000000}`
/// - ping:    `{"type":"ping","timestamp":1700000000000}`
/// - pong:    `{"type":"pong","timestamp":1700000000000,"serverTime":"..."}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Result payload, present on result broadcasts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Cleared flag, present on clear broadcasts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleared: Option<bool>,
    /// Epoch milliseconds at which the server stamped this message.
    pub timestamp: i64,
    /// Control message tag (`"ping"` or `"pong"`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub control: Option<String>,
    /// RFC 3339 server time, present on pong replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_time: Option<String>,
}

/// Classification of an envelope for dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeKind<'a> {
    /// A result broadcast carrying the stored value.
    Result(&'a str),
    /// The stored result was cleared.
    Cleared,
    /// Client keepalive.
    Ping,
    /// Server keepalive reply.
    Pong,
    /// Anything else — ignored without error.
    Unknown,
}

impl Envelope {
    /// A result broadcast.
    #[must_use]
    pub fn result(value: impl Into<String>, timestamp: i64) -> Self {
        Self {
            result: Some(value.into()),
            cleared: None,
            timestamp,
            control: None,
            server_time: None,
        }
    }

    /// A cleared broadcast.
    #[must_use]
    pub fn cleared(timestamp: i64) -> Self {
        Self {
            result: None,
            cleared: Some(true),
            timestamp,
            control: None,
            server_time: None,
        }
    }

    /// A client ping.
    #[must_use]
    pub fn ping(timestamp: i64) -> Self {
        Self {
            result: None,
            cleared: None,
            timestamp,
            control: Some("ping".to_owned()),
            server_time: None,
        }
    }

    /// A server pong reply.
    #[must_use]
    pub fn pong(timestamp: i64, server_time: impl Into<String>) -> Self {
        Self {
            result: None,
            cleared: None,
            timestamp,
            control: Some("pong".to_owned()),
            server_time: Some(server_time.into()),
        }
    }

    /// Classify this envelope for dispatch.
    ///
    /// Control tags take precedence; a non-empty `result` beats `cleared`.
    /// Empty results and unrecognized shapes classify as `Unknown`.
    #[must_use]
    pub fn kind(&self) -> EnvelopeKind<'_> {
        match self.control.as_deref() {
            Some("ping") => return EnvelopeKind::Ping,
            Some("pong") => return EnvelopeKind::Pong,
            Some(_) => return EnvelopeKind::Unknown,
            None => {}
        }
        if let Some(result) = self.result.as_deref() {
            if !result.is_empty() {
                return EnvelopeKind::Result(result);
            }
        }
        if self.cleared == Some(true) {
            return EnvelopeKind::Cleared;
        }
        EnvelopeKind::Unknown
    }

    /// Parse an envelope from raw text, returning `None` on malformed input.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}
