//! Chatwire - real-time chat session controller.
//!
//! This crate keeps one long-lived WebSocket session to a conversational
//! backend alive across transient failures, and turns its framed protocol
//! into an ordered, typed event log a renderer can consume.
//!
//! # Architecture
//!
//! - **Transport** - one physical connection attempt (open/send/close, raised events)
//! - **Reconnect policy** - pure decision: retry after a delay, or stop
//! - **Codec** - inbound frames to `SessionEvent`s, user text to the request frame
//! - **Session controller** - owns state, transport, timer and log; the only public surface
//!
//! # Modules
//!
//! - [`session`] - controller, events, subscriptions
//! - [`transport`] - transport trait and the WebSocket adapter
//! - [`codec`] - wire codec
//! - [`reconnect`] - reconnect policies
//! - [`config`] - configuration loading/saving

pub mod codec;
pub mod config;
pub mod constants;
pub mod reconnect;
pub mod session;
pub mod transport;
pub mod ws;

// Re-export commonly used types
pub use config::Config;
pub use reconnect::{FixedDelay, ReconnectPolicy, RetryDecision};
pub use session::{
    ConnectionState, LogEntry, SessionController, SessionEvent, SessionUpdate, Severity,
    SubmitOutcome, Subscription,
};
pub use transport::{WsTransport, WsTransportFactory};
