//! # hookrelay-server
//!
//! Axum HTTP + `WebSocket` relay server.
//!
//! - HTTP endpoints: inbound result callback, polling fallback, clear,
//!   health check, Prometheus metrics
//! - Single-slot [`store::ResultStore`]: at most one pending result
//!   process-wide, latest wins
//! - `WebSocket` gateway at `/ws`: connection registry, envelope fan-out,
//!   catch-up send for late joiners, heartbeat with pong-timeout
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`
//!
//! Latest-wins is a product decision, not an oversight: a late or duplicate
//! callback overwrites and re-broadcasts; nothing here queues or orders
//! results across concurrent requests.

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod store;
pub mod websocket;
