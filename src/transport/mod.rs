//! Transport abstraction for one physical connection attempt.
//!
//! # Architecture
//!
//! ```text
//! SessionController
//!     │  open(url, EventSink)          send(frame) / close()
//!     ▼                                      │
//! TransportFactory ──creates──▶ Transport ◀──┘
//!                                   │
//!                                   └── background task ──emit──▶ EventSink ──▶ controller inbox
//! ```
//!
//! A transport is single-use. It reports `Opened` or `Closed` to settle the
//! open, any number of `Message`s while open, and exactly one `Closed` at the
//! end. Every event is tagged with the attempt it came from, so the
//! controller can drop events from attempts it has already discarded.
//!
//! Rust guideline compliant 2026-02

pub mod websocket;

#[cfg(test)]
pub(crate) mod mock;

use tokio::sync::mpsc;

use crate::session::SessionInput;

pub use websocket::{WsTransport, WsTransportFactory};

/// Identifies one transport attempt within a session. Starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub u64);

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something a transport attempt observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed; sends are now accepted.
    Opened,
    /// One inbound text frame.
    Message(String),
    /// Non-terminal problem worth logging. A `Closed` follows if the
    /// attempt cannot continue.
    Error(String),
    /// Attempt is over. Reported exactly once.
    Closed {
        /// WebSocket close code (1006 if the connection dropped or never opened).
        code: u16,
        /// Close reason or error description.
        reason: String,
    },
}

/// Synchronous transport failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The attempt has not opened yet, or has already closed.
    #[error("transport is not open")]
    NotOpen,
    /// The frame could not be handed to the connection.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Delivery handle a transport uses to report events for its attempt.
#[derive(Debug, Clone)]
pub struct EventSink {
    attempt: AttemptId,
    tx: mpsc::UnboundedSender<SessionInput>,
}

impl EventSink {
    pub(crate) fn new(attempt: AttemptId, tx: mpsc::UnboundedSender<SessionInput>) -> Self {
        Self { attempt, tx }
    }

    /// The attempt this sink reports for.
    #[must_use]
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Report an event. Returns `false` once the session is no longer listening.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(SessionInput::Transport {
                attempt: self.attempt,
                event,
            })
            .is_ok()
    }
}

/// One physical connection attempt, owned exclusively by the controller.
pub trait Transport: Send + std::fmt::Debug {
    /// Queue one outbound frame.
    ///
    /// Fails immediately if the attempt is not open. Write errors that
    /// happen later on the socket surface as `Error` then `Closed` events.
    fn send(&mut self, frame: &str) -> Result<(), TransportError>;

    /// Request an orderly shutdown.
    ///
    /// Idempotent. A `Closed` event is still reported afterwards, and no
    /// `Message` follows it.
    fn close(&mut self);
}

/// Creates fresh transport attempts.
pub trait TransportFactory: Send {
    /// Concrete transport produced by this factory.
    type Transport: Transport;

    /// Begin connecting to `url`; progress is reported through `events`.
    ///
    /// Must not block. Called from within the tokio runtime.
    fn open(&mut self, url: &str, events: EventSink) -> Self::Transport;
}
