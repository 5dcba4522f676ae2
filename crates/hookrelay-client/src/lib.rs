//! # hookrelay-client
//!
//! Client side of the relay:
//!
//! - [`channel::DurableChannel`]: a WebSocket subscription that survives
//!   drops — exponential backoff, heartbeat, duplicate suppression, manual
//!   reconnect after giving up
//! - [`dispatch::RequestDispatcher`]: validates a submission, clears the
//!   previous result, and forwards the prompt to the external automation
//!   sink with a callback URL pointing back at the relay
//!
//! The reconnect/dedup logic lives in a pure state machine
//! ([`state::ChannelState`]) so the schedule is testable without sockets
//! or a clock.

#![deny(unsafe_code)]

pub mod channel;
pub mod dispatch;
pub mod state;

pub use channel::{ChannelUpdate, DurableChannel};
pub use dispatch::{DispatcherConfig, RequestDispatcher, SubmitReceipt};
pub use state::{ChannelState, ChannelStatus, CloseDecision, Delivery};
