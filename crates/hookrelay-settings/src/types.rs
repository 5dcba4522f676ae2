//! Settings types with compiled defaults.
//!
//! All keys are camelCase on disk so a hand-edited settings file reads the
//! same as the wire JSON.

use hookrelay_core::ReconnectPolicy;
use serde::{Deserialize, Serialize};

/// Top-level settings for the relay.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Server network and heartbeat settings.
    pub server: ServerSettings,
    /// Client-side submission and reconnect settings.
    pub client: ClientSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Server network and runtime settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP + WebSocket port (API and push channel share one listener).
    pub port: u16,
    /// WebSocket heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Silence window after which an unresponsive client is disconnected.
    pub heartbeat_timeout_ms: u64,
    /// Maximum concurrent push connections.
    pub max_connections: usize,
    /// Maximum WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 60_000,
            max_connections: 50,
            max_message_size: 1024 * 1024, // 1 MB
        }
    }
}

/// Client-side settings for submissions and the durable channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Base URL of the relay server.
    pub relay_url: String,
    /// Operator-configured URL of the external automation sink.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Path on the relay where the sink posts results back.
    pub callback_path: String,
    /// Maximum user input length in code points.
    pub max_input_chars: usize,
    /// Reconnect policy for the durable channel.
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            relay_url: "http://127.0.0.1:5000".to_string(),
            webhook_url: None,
            callback_path: "/api/webhook-result".to_string(),
            max_input_chars: 500,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Log verbosity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only.
    Error,
    /// Warnings and errors.
    Warn,
    /// Normal operation (default).
    #[default]
    Info,
    /// Per-message detail.
    Debug,
    /// Everything.
    Trace,
}

impl LogLevel {
    /// The tracing env-filter directive for this level.
    #[must_use]
    pub fn as_filter_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level emitted.
    pub level: LogLevel,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}
