//! Cancellable reconnect timer.
//!
//! The timer is a spawned tokio task that sleeps, then posts
//! [`SessionInput::ReconnectDue`] to the controller inbox. Dropping the
//! handle aborts the task. Each timer carries an id so a firing that raced
//! with cancellation is recognised as stale and ignored.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::SessionInput;

/// Handle to the single pending reconnect.
#[derive(Debug)]
pub(crate) struct ReconnectTimer {
    id: u64,
    delay: Duration,
    task: JoinHandle<()>,
}

impl ReconnectTimer {
    /// Spawn a timer that posts `ReconnectDue { timer: id }` after `delay`.
    pub(crate) fn arm(id: u64, delay: Duration, inbox: mpsc::UnboundedSender<SessionInput>) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inbox.send(SessionInput::ReconnectDue { timer: id });
        });
        Self { id, delay, task }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for ReconnectTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
