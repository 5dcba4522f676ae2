//! Reconnect policy and backoff calculation for the durable channel.
//!
//! The policy is pure math: the async scheduling lives in the client crate,
//! which makes the schedule testable without a clock. Delay for attempt `n`
//! is `min(base_interval × 1.5^n, cap)`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default base reconnect interval in milliseconds.
pub const DEFAULT_BASE_INTERVAL_MS: u64 = 3000;
/// Default backoff cap in milliseconds.
pub const DEFAULT_CAP_MS: u64 = 30_000;
/// Default maximum reconnect attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Backoff growth factor per attempt.
pub const BACKOFF_MULTIPLIER: f64 = 1.5;

/// Reconnect behavior for a durable channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Whether to reconnect automatically after a failure or close.
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,
    /// Base delay before the first retry, in milliseconds.
    #[serde(default = "default_base_interval_ms")]
    pub base_interval_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    #[serde(default = "default_cap_ms")]
    pub cap_ms: u64,
    /// Attempts before the channel stays down until a manual reconnect.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_auto_reconnect() -> bool {
    true
}
fn default_base_interval_ms() -> u64 {
    DEFAULT_BASE_INTERVAL_MS
}
fn default_cap_ms() -> u64 {
    DEFAULT_CAP_MS
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            base_interval_ms: DEFAULT_BASE_INTERVAL_MS,
            cap_ms: DEFAULT_CAP_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (zero-based).
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponential =
            (self.base_interval_ms as f64) * BACKOFF_MULTIPLIER.powi(attempt.min(64) as i32);
        let capped = exponential.min(self.cap_ms as f64);
        Duration::from_millis(capped.round() as u64)
    }

    /// Whether another automatic attempt is allowed after `attempt` failures.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.auto_reconnect && attempt < self.max_attempts
    }
}
