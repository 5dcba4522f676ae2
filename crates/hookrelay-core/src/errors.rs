//! Error taxonomy for the relay.
//!
//! Boundary errors (`InvalidInput`, `InvalidResult`) are rejected before any
//! work happens. `NoResultYet` is the normal empty state of the polling
//! fallback, not a failure. `ChannelLost` is recovered transparently by the
//! durable channel's reconnect policy and only ever surfaces as a
//! connectivity indicator.

use thiserror::Error;

/// Errors produced by the relay server and client.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A submission field was missing or over the size bound; rejected at
    /// the boundary, never forwarded.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A callback tried to store the internal "no value yet" sentinel.
    #[error("invalid result: {0}")]
    InvalidResult(String),

    /// The outbound call to the external automation sink failed. Not
    /// retried; surfaced to the caller inline.
    #[error("upstream webhook unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Polling before any callback arrived. A normal empty state.
    #[error("no result available yet")]
    NoResultYet,

    /// The push channel dropped. Recovered via the reconnect policy.
    #[error("push channel lost: {0}")]
    ChannelLost(String),

    /// HTTP transport failure talking to the relay itself.
    #[error("transport error: {0}")]
    Transport(String),
}

impl RelayError {
    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidResult(_) => "INVALID_RESULT",
            Self::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Self::NoResultYet => "NO_RESULT_YET",
            Self::ChannelLost(_) => "CHANNEL_LOST",
            Self::Transport(_) => "TRANSPORT_ERROR",
        }
    }

    /// Whether the condition can clear on its own with another attempt.
    ///
    /// Boundary rejections never retry; `NoResultYet` is not an error at
    /// all, the caller simply polls again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ChannelLost(_) | Self::Transport(_))
    }
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn codes_are_stable() {
        assert_eq!(RelayError::InvalidInput("x".into()).code(), "INVALID_INPUT");
        assert_eq!(
            RelayError::InvalidResult("x".into()).code(),
            "INVALID_RESULT"
        );
        assert_eq!(
            RelayError::UpstreamUnavailable("x".into()).code(),
            "UPSTREAM_UNAVAILABLE"
        );
        assert_eq!(RelayError::NoResultYet.code(), "NO_RESULT_YET");
        assert_eq!(RelayError::ChannelLost("x".into()).code(), "CHANNEL_LOST");
        assert_eq!(RelayError::Transport("x".into()).code(), "TRANSPORT_ERROR");
    }

    #[test]
    fn display_includes_context() {
        let err = RelayError::InvalidInput("input exceeds 500 characters".into());
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn channel_lost_is_retryable() {
        assert!(RelayError::ChannelLost("closed".into()).is_retryable());
        assert!(RelayError::Transport("refused".into()).is_retryable());
    }

    #[test]
    fn boundary_errors_are_not_retryable() {
        assert!(!RelayError::InvalidInput("too long".into()).is_retryable());
        assert!(!RelayError::InvalidResult("empty".into()).is_retryable());
        assert!(!RelayError::UpstreamUnavailable("503".into()).is_retryable());
        assert!(!RelayError::NoResultYet.is_retryable());
    }

    #[test]
    fn is_std_error() {
        let err = RelayError::NoResultYet;
        let _: &dyn std::error::Error = &err;
    }

    #[test]
    fn result_alias_works() {
        fn empty_poll() -> Result<String> {
            Err(RelayError::NoResultYet)
        }
        assert_matches!(empty_poll(), Err(RelayError::NoResultYet));
    }
}
