//! HTTP endpoints: inbound result callback, polling fallback, clear, health.
//!
//! The callback endpoint is what the external automation sink posts to when
//! a run finishes. Storing and broadcasting happen in one handler so the
//! polling view and the push channel can never disagree about the latest
//! result.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use hookrelay_core::Envelope;
use metrics::counter;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::health::health_check;
use crate::metrics::{POLL_REQUESTS_TOTAL, RESULTS_CLEARED_TOTAL, RESULTS_STORED_TOTAL};
use crate::server::AppState;

/// POST `/api/webhook-result` — inbound callback from the automation sink.
///
/// Accepts any JSON body with a `result` field, coerces it to text, stores
/// it in the slot, and broadcasts it to every connected client.
pub async fn receive_result(
    State(state): State<AppState>,
    body: Option<Json<Value>>,
) -> impl IntoResponse {
    let result = body
        .as_ref()
        .and_then(|Json(v)| v.get("result"))
        .and_then(coerce_to_text);

    let Some(result) = result else {
        warn!("callback rejected: missing result in request body");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "Missing result in request body",
            })),
        );
    };

    let timestamp = match state.store.set(&result) {
        Ok(ts) => ts,
        Err(e) => {
            warn!(error = %e, "callback rejected: unstorable result");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "message": "Missing result in request body",
                })),
            );
        }
    };
    counter!(RESULTS_STORED_TOTAL).increment(1);

    let delivered = state
        .broadcast
        .broadcast(&Envelope::result(&result, timestamp))
        .await;
    info!(timestamp, delivered, len = result.len(), "result stored and broadcast");

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Result received successfully",
            "timestamp": timestamp,
        })),
    )
}

/// GET `/api/webhook-result` — polling fallback for clients without a
/// working push channel.
pub async fn poll_result(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get() {
        Ok((result, timestamp)) => {
            counter!(POLL_REQUESTS_TOTAL, "outcome" => "hit").increment(1);
            (
                StatusCode::OK,
                Json(json!({ "result": result, "timestamp": timestamp })),
            )
        }
        Err(_) => {
            counter!(POLL_REQUESTS_TOTAL, "outcome" => "miss").increment(1);
            (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": "No result available yet. Please try again later.",
                })),
            )
        }
    }
}

/// POST `/api/clear-result` — empty the slot and tell every client.
pub async fn clear_result(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = state.store.clear();
    counter!(RESULTS_CLEARED_TOTAL).increment(1);

    let delivered = state.broadcast.broadcast(&Envelope::cleared(timestamp)).await;
    info!(timestamp, delivered, "result cleared and broadcast");

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Result cleared successfully",
            "timestamp": timestamp,
        })),
    )
}

/// GET `/api/health`.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let connections = state.broadcast.connection_count().await;
    let has_result = state.store.snapshot().result.is_some();
    Json(health_check(state.start_time, connections, has_result))
}

/// GET `/metrics` — Prometheus text format.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    crate::metrics::render(&state.metrics)
}

/// Coerce a JSON `result` field to text.
///
/// Strings pass through; numbers, booleans, objects and arrays keep their
/// JSON rendering. Null counts as absent.
fn coerce_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
