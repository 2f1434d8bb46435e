//! Reconnect policy.
//!
//! A policy is a pure decision: given how the last transport attempt ended,
//! either wait some delay and try again, or stop. The controller owns the
//! timer; the policy never sleeps or spawns anything.
//!
//! The default is a fixed 3 second delay with no attempt limit. The backend
//! sends no "do not retry" signal, so close codes are not distinguished.

use std::time::Duration;

use crate::constants::DEFAULT_RECONNECT_DELAY;

/// How a transport attempt ended, as seen by the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// WebSocket close code (1006 when the connection dropped or never opened).
    pub code: u16,
    /// Human-readable reason from the close frame or the transport error.
    pub reason: String,
    /// Consecutive closes since the last successful open, including this one.
    pub consecutive_failures: u32,
}

/// What the controller should do after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Arm a timer and open a fresh transport when it fires.
    RetryAfter(Duration),
    /// Stay closed.
    Stop,
}

/// Maps a disconnection to a retry delay or "stop".
pub trait ReconnectPolicy: Send + std::fmt::Debug {
    /// Decide what to do after `close`.
    fn next_attempt_delay(&self, close: &CloseReason) -> RetryDecision;
}

/// Fixed delay between attempts, optionally bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    /// Retry forever after `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Stop once `max` consecutive closes have been seen.
    #[must_use]
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max);
        self
    }

    /// The delay between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy for FixedDelay {
    fn next_attempt_delay(&self, close: &CloseReason) -> RetryDecision {
        match self.max_attempts {
            Some(max) if close.consecutive_failures > max => RetryDecision::Stop,
            _ => RetryDecision::RetryAfter(self.delay),
        }
    }
}
