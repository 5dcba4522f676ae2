//! WebSocket push channel: connection registry, envelope fan-out, sessions.

pub mod broadcast;
pub mod connection;
pub mod session;

pub use broadcast::BroadcastManager;
pub use connection::ClientConnection;
pub use session::{run_ws_session, Heartbeat};
