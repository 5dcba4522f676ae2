//! Single-slot result store.
//!
//! The relay holds at most one pending result process-wide. An inbound
//! callback overwrites whatever was there (latest wins); a clear empties
//! the slot. Every mutation advances a monotonic epoch-millisecond stamp
//! so consumers can dedup on `(result, timestamp)` even when two writes
//! land within the same millisecond.

use hookrelay_core::{epoch_ms, RelayError, Result};
use parking_lot::Mutex;

/// Contents of the slot at a point in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingResult {
    /// The stored result text, or `None` when the slot is empty.
    pub result: Option<String>,
    /// Epoch-millisecond stamp of the last mutation.
    pub timestamp: i64,
}

/// Thread-safe single-slot store for the latest webhook result.
#[derive(Debug)]
pub struct ResultStore {
    slot: Mutex<PendingResult>,
}

impl ResultStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(PendingResult {
                result: None,
                timestamp: 0,
            }),
        }
    }

    /// Store a result, replacing any previous one.
    ///
    /// Returns the stamp assigned to this write.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidResult`] if `result` is empty after
    /// trimming.
    pub fn set(&self, result: &str) -> Result<i64> {
        if result.trim().is_empty() {
            return Err(RelayError::InvalidResult("empty result".into()));
        }
        let mut slot = self.slot.lock();
        let stamp = next_stamp(slot.timestamp);
        slot.result = Some(result.to_string());
        slot.timestamp = stamp;
        Ok(stamp)
    }

    /// Empty the slot. Returns the stamp assigned to the clear.
    ///
    /// Clearing an already-empty slot still advances the stamp, so a
    /// broadcastable "cleared" event always carries a fresh timestamp.
    pub fn clear(&self) -> i64 {
        let mut slot = self.slot.lock();
        let stamp = next_stamp(slot.timestamp);
        slot.result = None;
        slot.timestamp = stamp;
        stamp
    }

    /// Read the stored result and its stamp.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NoResultYet`] when the slot is empty.
    pub fn get(&self) -> Result<(String, i64)> {
        let slot = self.slot.lock();
        match &slot.result {
            Some(result) => Ok((result.clone(), slot.timestamp)),
            None => Err(RelayError::NoResultYet),
        }
    }

    /// Snapshot the slot without interpreting emptiness as an error.
    pub fn snapshot(&self) -> PendingResult {
        self.slot.lock().clone()
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Next stamp: wall clock, but never at or below the previous stamp.
fn next_stamp(prev: i64) -> i64 {
    epoch_ms().max(prev + 1)
}
