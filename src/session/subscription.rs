//! Log and state change notifications.
//!
//! Each subscriber gets its own bounded queue, so the controller never waits
//! on a renderer. A subscriber that falls a full queue behind is dropped:
//! its receiver yields what was queued, then `None`. Subscribers only see
//! updates produced after they subscribed; `SessionController::log()` covers
//! the catch-up read.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::constants::SUBSCRIBER_QUEUE_CAPACITY;

use super::event::LogEntry;
use super::ConnectionState;

/// A change observed by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// An entry was appended to the log.
    Appended(LogEntry),
    /// The log was truncated to empty.
    Cleared,
    /// Connection state moved.
    StateChanged(ConnectionState),
}

/// Identifies a subscription for [`crate::session::SessionController::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiving end of a subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::Receiver<SessionUpdate>,
}

impl Subscription {
    /// This subscription's id.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next update. `None` once unsubscribed, dropped for
    /// lagging, or the controller is gone.
    ///
    /// Cancel safe.
    pub async fn recv(&mut self) -> Option<SessionUpdate> {
        self.rx.recv().await
    }

    /// Take the next update if one is queued.
    pub fn try_recv(&mut self) -> Option<SessionUpdate> {
        self.rx.try_recv().ok()
    }

    /// Take every queued update.
    pub fn drain(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = self.rx.try_recv() {
            updates.push(update);
        }
        updates
    }
}

/// Fan-out list owned by the controller.
#[derive(Debug)]
pub(crate) struct Subscribers {
    senders: Vec<(SubscriptionId, mpsc::Sender<SessionUpdate>)>,
    next_id: u64,
    capacity: usize,
}

impl Default for Subscribers {
    fn default() -> Self {
        Self::with_capacity(SUBSCRIBER_QUEUE_CAPACITY)
    }
}

impl Subscribers {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            senders: Vec::new(),
            next_id: 0,
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn subscribe(&mut self) -> Subscription {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        let (tx, rx) = mpsc::channel(self.capacity);
        self.senders.push((id, tx));
        Subscription { id, rx }
    }

    /// Returns `true` if the subscription was still registered.
    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.senders.len();
        self.senders.retain(|(existing, _)| *existing != id);
        self.senders.len() != before
    }

    /// Deliver to every live subscriber, pruning dropped and lagging ones.
    pub(crate) fn notify(&mut self, update: &SessionUpdate) {
        self.senders.retain(|(id, tx)| match tx.try_send(update.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("Subscriber {:?} fell behind; unsubscribing it", id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}
