//! `RelayServer` — Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use hookrelay_core::ConnectionId;
use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api;
use crate::config::ServerConfig;
use crate::shutdown::ShutdownCoordinator;
use crate::store::ResultStore;
use crate::websocket::session::Heartbeat;
use crate::websocket::{run_ws_session, BroadcastManager};

/// Errors raised while starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind the listen address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address we tried to bind.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Single-slot result store.
    pub store: Arc<ResultStore>,
    /// Broadcast manager for envelope fan-out.
    pub broadcast: Arc<BroadcastManager>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Handle for rendering `/metrics`.
    pub metrics: PrometheusHandle,
}

/// The relay server: HTTP API plus the WebSocket push channel on one
/// listener.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    store: Arc<ResultStore>,
    broadcast: Arc<BroadcastManager>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: PrometheusHandle,
    start_time: Instant,
}

impl RelayServer {
    /// Create a new server.
    #[must_use]
    pub fn new(config: ServerConfig, metrics: PrometheusHandle) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(ResultStore::new()),
            broadcast: Arc::new(BroadcastManager::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            store: self.store.clone(),
            broadcast: self.broadcast.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            config: self.config.clone(),
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route(
                "/api/webhook-result",
                get(api::poll_result).post(api::receive_result),
            )
            .route("/api/clear-result", post(api::clear_result))
            .route("/api/health", get(api::health))
            .route("/metrics", get(api::metrics))
            .route("/ws", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the join
    /// handle of the serve task.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the listen address is taken or
    /// not bindable.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr,
            source,
        })?;
        info!(%local_addr, "relay server listening");

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned());
            if let Err(e) = serve.await {
                warn!(error = %e, "serve loop exited with error");
            }
        });

        Ok((local_addr, handle))
    }

    /// Get the result store.
    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    /// Get the broadcast manager.
    pub fn broadcast(&self) -> &Arc<BroadcastManager> {
        &self.broadcast
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /ws — upgrade to a push session.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let current = state.broadcast.connection_count().await;
    if current >= state.config.max_connections {
        warn!(current, limit = state.config.max_connections, "connection limit reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    }

    let connection_id = ConnectionId::new();
    let heartbeat = Heartbeat {
        ping_interval: Duration::from_secs(state.config.heartbeat_interval_secs),
        pong_timeout: Duration::from_secs(state.config.heartbeat_timeout_secs),
    };

    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(
                socket,
                connection_id,
                state.store.clone(),
                state.broadcast.clone(),
                heartbeat,
                state.shutdown.token(),
            )
        })
}
