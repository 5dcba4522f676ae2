//! Request dispatch to the external automation sink.
//!
//! A submission clears the relay's held result first, then forwards the
//! prompt to the sink with a callback URL pointing back at the relay. The
//! sink answers out of band by posting to that callback; nothing here
//! waits for the result.

use hookrelay_core::{RelayError, RequestId, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{info, warn};

/// Where submissions go and how they are bounded.
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Base URL of the relay server.
    pub relay_url: String,
    /// URL of the external automation sink.
    pub webhook_url: String,
    /// Path on the relay where the sink posts results back.
    pub callback_path: String,
    /// Maximum user input length in code points.
    pub max_input_chars: usize,
}

impl DispatcherConfig {
    /// The full callback URL handed to the sink.
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.relay_url, self.callback_path)
    }
}

/// Acknowledgement that a submission was forwarded to the sink.
#[derive(Clone, Debug)]
pub struct SubmitReceipt {
    /// ID assigned to this submission; the result arrives out of band.
    pub request_id: RequestId,
}

/// Forwards validated submissions to the automation sink.
pub struct RequestDispatcher {
    http: reqwest::Client,
    config: DispatcherConfig,
}

impl RequestDispatcher {
    /// Create a dispatcher with a fresh HTTP client.
    #[must_use]
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Validate and forward a submission to the sink.
    ///
    /// The previous result is cleared first so stale output can never be
    /// mistaken for the answer to this request. A failed clear is logged
    /// and does not block the submission.
    ///
    /// # Errors
    ///
    /// [`RelayError::InvalidInput`] for empty or over-length input,
    /// [`RelayError::Transport`] when the sink is unreachable, and
    /// [`RelayError::UpstreamUnavailable`] when it answers non-2xx.
    pub async fn submit(&self, option_type: &str, user_input: &str) -> Result<SubmitReceipt> {
        let input = user_input.trim();
        if input.is_empty() {
            return Err(RelayError::InvalidInput("input is empty".into()));
        }
        let max = self.config.max_input_chars;
        if input.chars().count() > max {
            return Err(RelayError::InvalidInput(format!(
                "input exceeds {max} characters"
            )));
        }

        if let Err(e) = self.clear().await {
            warn!(error = %e, "failed to clear previous result, submitting anyway");
        }

        let request_id = RequestId::new();
        let payload = json!({
            "requestId": request_id,
            "optionType": option_type,
            "userInput": input,
            "callbackUrl": self.config.callback_url(),
        });

        let resp = self
            .http
            .post(&self.config.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RelayError::UpstreamUnavailable(format!(
                "sink returned {status}"
            )));
        }

        info!(request_id = %request_id, option_type, "submission forwarded to sink");
        Ok(SubmitReceipt { request_id })
    }

    /// Poll the relay for the held result.
    ///
    /// # Errors
    ///
    /// [`RelayError::NoResultYet`] while the slot is empty,
    /// [`RelayError::Transport`] for HTTP failures.
    pub async fn poll(&self) -> Result<(String, i64)> {
        let url = format!("{}/api/webhook-result", self.config.relay_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(RelayError::NoResultYet);
        }
        if !resp.status().is_success() {
            return Err(RelayError::Transport(format!(
                "relay returned {}",
                resp.status()
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        let result = body
            .get("result")
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::Transport("missing result in response".into()))?;
        let timestamp = body
            .get("timestamp")
            .and_then(Value::as_i64)
            .unwrap_or_default();
        Ok((result.to_owned(), timestamp))
    }

    /// Ask the relay to empty the result slot.
    ///
    /// # Errors
    ///
    /// [`RelayError::Transport`] for HTTP failures or non-2xx replies.
    pub async fn clear(&self) -> Result<()> {
        let url = format!("{}/api/clear-result", self.config.relay_url);
        let resp = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(RelayError::Transport(format!(
                "relay returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(relay_url: &str, webhook_url: &str) -> DispatcherConfig {
        DispatcherConfig {
            relay_url: relay_url.to_owned(),
            webhook_url: webhook_url.to_owned(),
            callback_path: "/api/webhook-result".to_owned(),
            max_input_chars: 500,
        }
    }

    async fn mock_relay() -> MockServer {
        let relay = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/clear-result"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&relay)
            .await;
        relay
    }

    #[tokio::test]
    async fn submit_forwards_payload_with_callback() {
        let relay = mock_relay().await;
        let sink = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "optionType": "ingredientAnalyze",
                "userInput": "turmeric, saffron",
                "callbackUrl": format!("{}/api/webhook-result", relay.uri()),
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&sink)
            .await;

        let dispatcher = RequestDispatcher::new(config(&relay.uri(), &sink.uri()));
        let receipt = dispatcher
            .submit("ingredientAnalyze", "turmeric, saffron")
            .await
            .unwrap();
        assert!(receipt.request_id.as_str().starts_with("req_"));
    }

    #[tokio::test]
    async fn submit_trims_input() {
        let relay = mock_relay().await;
        let sink = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"userInput": "cumin"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&sink)
            .await;

        let dispatcher = RequestDispatcher::new(config(&relay.uri(), &sink.uri()));
        dispatcher.submit("ingredientAnalyze", "  cumin  ").await.unwrap();
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_any_request() {
        let dispatcher = RequestDispatcher::new(config(
            "http://127.0.0.1:1",
            "http://127.0.0.1:1/webhook",
        ));
        assert_matches!(
            dispatcher.submit("ingredientAnalyze", "   ").await,
            Err(RelayError::InvalidInput(_))
        );
    }

    #[tokio::test]
    async fn over_length_input_is_rejected() {
        let dispatcher = RequestDispatcher::new(config(
            "http://127.0.0.1:1",
            "http://127.0.0.1:1/webhook",
        ));
        let long = "x".repeat(501);
        let err = dispatcher
            .submit("ingredientAnalyze", &long)
            .await
            .unwrap_err();
        assert_matches!(err, RelayError::InvalidInput(_));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn input_at_limit_is_accepted() {
        let relay = mock_relay().await;
        let sink = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&sink)
            .await;

        let dispatcher = RequestDispatcher::new(config(&relay.uri(), &sink.uri()));
        let exact = "y".repeat(500);
        assert!(dispatcher.submit("ingredientAnalyze", &exact).await.is_ok());
    }

    #[tokio::test]
    async fn failed_clear_does_not_block_submit() {
        let relay = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/clear-result"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&relay)
            .await;
        let sink = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&sink)
            .await;

        let dispatcher = RequestDispatcher::new(config(&relay.uri(), &sink.uri()));
        assert!(dispatcher.submit("ingredientAnalyze", "ok").await.is_ok());
    }

    #[tokio::test]
    async fn sink_error_status_surfaces_as_upstream_unavailable() {
        let relay = mock_relay().await;
        let sink = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&sink)
            .await;

        let dispatcher = RequestDispatcher::new(config(&relay.uri(), &sink.uri()));
        assert_matches!(
            dispatcher.submit("ingredientAnalyze", "hello").await,
            Err(RelayError::UpstreamUnavailable(_))
        );
    }

    #[tokio::test]
    async fn unreachable_sink_is_a_transport_error() {
        let relay = mock_relay().await;
        let dispatcher =
            RequestDispatcher::new(config(&relay.uri(), "http://127.0.0.1:1/webhook"));
        assert_matches!(
            dispatcher.submit("ingredientAnalyze", "hello").await,
            Err(RelayError::Transport(_))
        );
    }

    #[tokio::test]
    async fn poll_maps_404_to_no_result_yet() {
        let relay = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/webhook-result"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": "No result available yet. Please try again later.",
            })))
            .mount(&relay)
            .await;

        let dispatcher = RequestDispatcher::new(config(&relay.uri(), "http://unused"));
        assert_matches!(dispatcher.poll().await, Err(RelayError::NoResultYet));
    }

    #[tokio::test]
    async fn poll_returns_result_and_stamp() {
        let relay = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/webhook-result"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "Saffron is the world's most expensive spice.",
                "timestamp": 1_700_000_000_000_i64,
            })))
            .mount(&relay)
            .await;

        let dispatcher = RequestDispatcher::new(config(&relay.uri(), "http://unused"));
        let (result, timestamp) = dispatcher.poll().await.unwrap();
        assert!(result.contains("Saffron"));
        assert_eq!(timestamp, 1_700_000_000_000);
    }

    #[test]
    fn callback_url_joins_relay_and_path() {
        let cfg = config("http://relay:5000", "http://sink");
        assert_eq!(cfg.callback_url(), "http://relay:5000/api/webhook-result");
    }
}
