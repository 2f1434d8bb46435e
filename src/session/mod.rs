//! Real-time chat session.
//!
//! A [`SessionController`] owns one logical conversation: the ordered event
//! log, the current transport attempt, and the reconnect timer. It survives
//! any number of transport attempts; reconnecting never clears the log.
//!
//! # State machine
//!
//! ```text
//!            connect()            Opened
//!   Idle ─────────────▶ Connecting ──────▶ Open
//!                          ▲    │ Closed     │ Closed
//!             timer fires  │    ▼            ▼
//!                          └── Closed { will_retry } ◀─┘
//!
//!   any state ── dispose() ──▶ Disposed (terminal)
//! ```
//!
//! # Modules
//!
//! - [`controller`] - the controller itself
//! - [`event`] - `SessionEvent`, `Severity`, `LogEntry`
//! - [`subscription`] - per-subscriber update queues

pub mod controller;
pub mod event;
mod history;
pub mod subscription;
mod timer;

#[cfg(test)]
mod tests;

use serde::Serialize;

pub use controller::{SessionController, SubmitOutcome};
pub(crate) use controller::SessionInput;
pub use event::{LogEntry, SessionEvent, Severity};
pub use subscription::{SessionUpdate, Subscription, SubscriptionId};

/// Read-only snapshot of where the session's connection stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport has been created yet.
    Idle,
    /// A transport attempt is handshaking.
    Connecting {
        /// Attempt number, starting at 1.
        attempt: u64,
    },
    /// The current attempt is open; sends are accepted.
    Open {
        /// Attempt number of the open transport.
        attempt: u64,
    },
    /// The last attempt closed.
    Closed {
        /// Whether a reconnect timer is armed.
        will_retry: bool,
    },
    /// Terminal; the controller is inert.
    Disposed,
}

impl ConnectionState {
    /// Whether sends are currently accepted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting { attempt } => write!(f, "connecting (attempt {attempt})"),
            Self::Open { .. } => write!(f, "open"),
            Self::Closed { will_retry: true } => write!(f, "closed, retrying"),
            Self::Closed { will_retry: false } => write!(f, "closed"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}
