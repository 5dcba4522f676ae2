//! # hookrelay-daemon
//!
//! Relay server binary — loads settings, wires logging and metrics, and
//! runs the HTTP/WebSocket server until a shutdown signal.

#![deny(unsafe_code)]

mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hookrelay_server::config::ServerConfig;
use hookrelay_server::metrics::install_recorder;
use hookrelay_server::server::RelayServer;
use hookrelay_settings::loader;
use hookrelay_settings::types::RelaySettings;

/// Webhook result relay server.
#[derive(Parser, Debug)]
#[command(name = "hookrelayd", about = "Webhook result relay server")]
struct Cli {
    /// Host to bind (overrides settings if specified).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings if specified; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the settings file (default `~/.hookrelay/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

/// Build the server config from settings plus CLI overrides.
fn server_config(args: &Cli, settings: &RelaySettings) -> ServerConfig {
    ServerConfig {
        host: args.host.clone().unwrap_or_else(|| settings.server.host.clone()),
        port: args.port.unwrap_or(settings.server.port),
        max_connections: settings.server.max_connections,
        heartbeat_interval_secs: settings.server.heartbeat_interval_ms.div_ceil(1000),
        heartbeat_timeout_secs: settings.server.heartbeat_timeout_ms.div_ceil(1000),
        max_message_size: settings.server.max_message_size,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args.settings.clone().unwrap_or_else(loader::settings_path);
    let settings = loader::load_settings_from_path(&settings_path)
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;

    logging::init_subscriber(&settings.logging);
    let metrics_handle = install_recorder();

    let config = server_config(&args, &settings);
    let server = RelayServer::new(config, metrics_handle);

    let (addr, handle) = server.listen().await.context("failed to bind server")?;
    tracing::info!("relay listening on http://{addr} (push channel at ws://{addr}/ws)");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!("shutting down...");
    server.shutdown().graceful_shutdown(vec![handle], None).await;

    tracing::info!("shutdown complete");
    Ok(())
}
