//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If `~/.hookrelay/settings.json` exists, deep-merge user values over
//!    defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{LogLevel, RelaySettings};

/// Resolve the path to the settings file (`~/.hookrelay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".hookrelay").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let defaults = serde_json::to_value(RelaySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: RelaySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Each env var has strict parsing rules; invalid values are silently
/// ignored (fall back to file/default).
pub fn apply_env_overrides(settings: &mut RelaySettings) {
    // ── Server settings ─────────────────────────────────────────────
    if let Some(v) = read_env_string("HOOKRELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("HOOKRELAY_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_u64("HOOKRELAY_HEARTBEAT_INTERVAL_MS", 1000, 600_000) {
        settings.server.heartbeat_interval_ms = v;
    }
    if let Some(v) = read_env_u64("HOOKRELAY_HEARTBEAT_TIMEOUT_MS", 1000, 3_600_000) {
        settings.server.heartbeat_timeout_ms = v;
    }
    if let Some(v) = read_env_usize("HOOKRELAY_MAX_CONNECTIONS", 1, 100_000) {
        settings.server.max_connections = v;
    }

    // ── Client settings ─────────────────────────────────────────────
    if let Some(v) = read_env_string("HOOKRELAY_RELAY_URL") {
        settings.client.relay_url = v;
    }
    if let Some(v) = read_env_string("HOOKRELAY_WEBHOOK_URL") {
        settings.client.webhook_url = Some(v);
    }
    if let Some(v) = read_env_usize("HOOKRELAY_MAX_INPUT_CHARS", 1, 100_000) {
        settings.client.max_input_chars = v;
    }

    // ── Logging settings ────────────────────────────────────────────
    if let Some(v) = read_env_string("HOOKRELAY_LOG_LEVEL") {
        match v.to_ascii_lowercase().as_str() {
            "error" => settings.logging.level = LogLevel::Error,
            "warn" => settings.logging.level = LogLevel::Warn,
            "info" => settings.logging.level = LogLevel::Info,
            "debug" => settings.logging.level = LogLevel::Debug,
            "trace" => settings.logging.level = LogLevel::Trace,
            _ => {}
        }
    }
    if let Some(v) = read_env_bool("HOOKRELAY_LOG_JSON") {
        settings.logging.json = v;
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    std::env::var(name)
        .ok()?
        .parse::<u16>()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    std::env::var(name)
        .ok()?
        .parse::<u64>()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    std::env::var(name)
        .ok()?
        .parse::<usize>()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

fn read_env_bool(name: &str) -> Option<bool> {
    match std::env::var(name).ok()?.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
