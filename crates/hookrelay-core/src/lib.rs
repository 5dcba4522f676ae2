//! # hookrelay-core
//!
//! Foundation types shared by the hookrelay server and client:
//!
//! - **Envelope**: the tagged JSON payload pushed over the WebSocket channel
//!   (a result, a cleared signal, or a ping/pong control message)
//! - **Errors**: `RelayError` taxonomy via `thiserror`
//! - **Reconnect policy**: exponential backoff math for the durable channel
//! - **Branded IDs**: `RequestId` / `ConnectionId` newtypes for type safety
//!
//! The relay holds a single pending result process-wide and the most recent
//! one wins; nothing here implies ordering or history across concurrent
//! requests.

#![deny(unsafe_code)]

pub mod backoff;
pub mod envelope;
pub mod errors;
pub mod ids;

pub use backoff::ReconnectPolicy;
pub use envelope::{Envelope, EnvelopeKind, epoch_ms};
pub use errors::{RelayError, Result};
pub use ids::{ConnectionId, RequestId};
