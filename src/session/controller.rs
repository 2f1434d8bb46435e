//! Session controller.
//!
//! Owns the session log, the live transport attempt and the reconnect
//! timer. Everything that can change the session arrives either as a caller
//! method (`connect`, `submit`, `clear`, `dispose`) or as a [`SessionInput`]
//! on the controller's inbox, which the caller drains with [`pump`] or
//! [`try_pump`]. Each input is handled synchronously to completion, so
//! transitions never interleave.
//!
//! # Usage
//!
//! ```ignore
//! let mut controller = SessionController::new(endpoint, WsTransportFactory::new(), FixedDelay::default());
//! let mut updates = controller.subscribe();
//! controller.connect();
//!
//! loop {
//!     tokio::select! {
//!         alive = controller.pump() => if !alive { break },
//!         Some(update) = updates.recv() => render(update),
//!         line = input.next_line() => { controller.submit(&line?); }
//!     }
//! }
//! ```
//!
//! [`pump`]: SessionController::pump
//! [`try_pump`]: SessionController::try_pump

use tokio::sync::mpsc;
use uuid::Uuid;

use super::event::{LogEntry, SessionEvent};
use super::history::EventLog;
use super::subscription::{SessionUpdate, Subscribers, Subscription, SubscriptionId};
use super::timer::ReconnectTimer;
use super::ConnectionState;
use crate::codec;
use crate::reconnect::{CloseReason, ReconnectPolicy, RetryDecision};
use crate::transport::{AttemptId, EventSink, Transport, TransportError, TransportEvent, TransportFactory};

/// Work queued for the controller by transports and timers.
#[derive(Debug)]
pub(crate) enum SessionInput {
    /// Event raised by a transport attempt.
    Transport {
        /// Attempt that raised it.
        attempt: AttemptId,
        /// What happened.
        event: TransportEvent,
    },
    /// A reconnect timer elapsed.
    ReconnectDue {
        /// Id of the timer that fired.
        timer: u64,
    },
}

/// Result of [`SessionController::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Recorded and handed to the open transport.
    Sent,
    /// Blank after trimming; nothing recorded, nothing sent.
    Empty,
    /// Recorded, but the session is not open. An error notice was logged.
    NotConnected,
    /// Recorded, but the transport refused the frame. An error notice was logged.
    SendFailed(TransportError),
    /// The controller has been disposed; nothing recorded, nothing sent.
    Disposed,
}

impl SubmitOutcome {
    /// Whether the frame reached the transport.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Lifecycle state with the resources each state owns.
///
/// The transport only exists inside `Connecting` and `Open`, and only the
/// `Open` arm hands it out for sending.
#[derive(Debug)]
enum Link<T> {
    Idle,
    Connecting { attempt: AttemptId, transport: T },
    Open {
        attempt: AttemptId,
        transport: T,
        /// A message went out and no frame has come back since.
        awaiting_reply: bool,
        /// The transport reported an error on this attempt.
        failed: bool,
    },
    Closed { retry: Option<ReconnectTimer> },
    Disposed,
}

/// Controller for one logical chat session.
pub struct SessionController<F: TransportFactory> {
    id: Uuid,
    endpoint: String,
    factory: F,
    policy: Box<dyn ReconnectPolicy>,
    link: Link<F::Transport>,
    log: EventLog,
    subscribers: Subscribers,
    inbox_tx: mpsc::UnboundedSender<SessionInput>,
    inbox_rx: mpsc::UnboundedReceiver<SessionInput>,
    attempts: u64,
    consecutive_failures: u32,
    next_timer_id: u64,
}

impl<F: TransportFactory> std::fmt::Debug for SessionController<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .field("log_len", &self.log.entries().len())
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}

impl<F: TransportFactory> SessionController<F> {
    /// Create an idle controller. No transport exists until [`connect`](Self::connect).
    pub fn new(endpoint: impl Into<String>, factory: F, policy: impl ReconnectPolicy + 'static) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            id: Uuid::new_v4(),
            endpoint: endpoint.into(),
            factory,
            policy: Box::new(policy),
            link: Link::Idle,
            log: EventLog::new(),
            subscribers: Subscribers::default(),
            inbox_tx,
            inbox_rx,
            attempts: 0,
            consecutive_failures: 0,
            next_timer_id: 0,
        }
    }

    /// Session id used in log lines.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Endpoint every attempt connects to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        match &self.link {
            Link::Idle => ConnectionState::Idle,
            Link::Connecting { attempt, .. } => ConnectionState::Connecting { attempt: attempt.0 },
            Link::Open { attempt, .. } => ConnectionState::Open { attempt: attempt.0 },
            Link::Closed { retry } => ConnectionState::Closed {
                will_retry: retry.is_some(),
            },
            Link::Disposed => ConnectionState::Disposed,
        }
    }

    /// Snapshot of the log, oldest first.
    #[must_use]
    pub fn log(&self) -> &[LogEntry] {
        self.log.entries()
    }

    /// Subscribe to future log appends, clears and state changes.
    ///
    /// The queue holds up to `SUBSCRIBER_QUEUE_CAPACITY` unread updates. A
    /// subscriber that lets it fill is unsubscribed; read `log()` to resync.
    pub fn subscribe(&mut self) -> Subscription {
        self.subscribers.subscribe()
    }

    /// Stop delivering to a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Start connecting.
    ///
    /// From `Idle` this creates the first attempt. From `Closed` it cancels
    /// any armed timer and tries again immediately. Otherwise a no-op.
    pub fn connect(&mut self) {
        match self.link {
            Link::Idle => self.open_attempt(),
            Link::Closed { .. } => {
                log::info!("[session {}] Manual reconnect", self.id);
                self.consecutive_failures = 0;
                // Replacing the link drops (and so aborts) any armed timer.
                self.open_attempt();
            }
            Link::Connecting { .. } | Link::Open { .. } => {
                log::debug!("[session {}] connect() ignored: already {}", self.id, self.state());
            }
            Link::Disposed => {
                log::warn!("[session {}] connect() after dispose ignored", self.id);
            }
        }
    }

    /// Submit user text.
    ///
    /// Blank text is rejected with no side effect. Otherwise the text is
    /// recorded as `UserInput` first, then sent if the session is open. A
    /// failed or impossible send is recorded as an error notice and not
    /// retried. After `dispose` only a "disposed" error notice is recorded.
    pub fn submit(&mut self, text: &str) -> SubmitOutcome {
        if matches!(self.link, Link::Disposed) {
            log::warn!("[session {}] submit() after dispose ignored", self.id);
            self.append(SessionEvent::error("Session disposed; message was not sent"));
            return SubmitOutcome::Disposed;
        }
        if text.trim().is_empty() {
            return SubmitOutcome::Empty;
        }

        self.append(SessionEvent::UserInput {
            text: text.to_string(),
        });

        let result = match &mut self.link {
            Link::Open {
                attempt,
                transport,
                awaiting_reply,
                ..
            } => {
                log::debug!("[session {}] Sending {} bytes on attempt {}", self.id, text.len(), attempt);
                let sent = transport.send(&codec::encode(text));
                if sent.is_ok() {
                    *awaiting_reply = true;
                }
                Some(sent)
            }
            _ => None,
        };

        match result {
            Some(Ok(())) => SubmitOutcome::Sent,
            Some(Err(e)) => {
                log::warn!("[session {}] Send failed: {}", self.id, e);
                self.append(SessionEvent::error(format!("Message not sent: {e}")));
                SubmitOutcome::SendFailed(e)
            }
            None => {
                self.append(SessionEvent::error(format!(
                    "Not connected ({}); message was not sent",
                    self.state()
                )));
                SubmitOutcome::NotConnected
            }
        }
    }

    /// Truncate the log. Connection state is untouched and the backend is not told.
    pub fn clear(&mut self) {
        if matches!(self.link, Link::Disposed) {
            return;
        }
        self.log.clear();
        self.subscribers.notify(&SessionUpdate::Cleared);
    }

    /// Tear the session down for good.
    ///
    /// Cancels any reconnect timer, closes any live transport (including one
    /// still handshaking), and makes the controller inert. Idempotent.
    pub fn dispose(&mut self) {
        match std::mem::replace(&mut self.link, Link::Disposed) {
            Link::Disposed => return,
            Link::Connecting { attempt, mut transport }
            | Link::Open {
                attempt,
                mut transport,
                ..
            } => {
                log::info!("[session {}] Disposing; closing attempt {}", self.id, attempt);
                transport.close();
            }
            Link::Closed { retry } => {
                if let Some(timer) = retry {
                    log::info!("[session {}] Disposing; cancelling reconnect timer", self.id);
                    drop(timer);
                }
            }
            Link::Idle => {
                log::info!("[session {}] Disposing idle session", self.id);
            }
        }
        self.inbox_rx.close();
        self.subscribers
            .notify(&SessionUpdate::StateChanged(ConnectionState::Disposed));
    }

    /// Wait for the next transport or timer input and apply it.
    ///
    /// Returns `false` once the controller is disposed. Cancel safe: an input
    /// is either fully applied or left queued.
    pub async fn pump(&mut self) -> bool {
        if matches!(self.link, Link::Disposed) {
            return false;
        }
        match self.inbox_rx.recv().await {
            Some(input) => {
                self.handle(input);
                !matches!(self.link, Link::Disposed)
            }
            None => false,
        }
    }

    /// Apply every input already queued, without waiting. Returns how many were applied.
    pub fn try_pump(&mut self) -> usize {
        let mut applied = 0;
        while !matches!(self.link, Link::Disposed) {
            let Ok(input) = self.inbox_rx.try_recv() else {
                break;
            };
            self.handle(input);
            applied += 1;
        }
        applied
    }

    fn handle(&mut self, input: SessionInput) {
        match input {
            SessionInput::Transport { attempt, event } => self.on_transport_event(attempt, event),
            SessionInput::ReconnectDue { timer } => self.on_reconnect_due(timer),
        }
    }

    fn current_attempt(&self) -> Option<AttemptId> {
        match &self.link {
            Link::Connecting { attempt, .. } | Link::Open { attempt, .. } => Some(*attempt),
            _ => None,
        }
    }

    fn on_transport_event(&mut self, attempt: AttemptId, event: TransportEvent) {
        if self.current_attempt() != Some(attempt) {
            log::debug!(
                "[session {}] Dropping {:?} from stale attempt {}",
                self.id,
                event,
                attempt
            );
            return;
        }

        match event {
            TransportEvent::Opened => self.on_opened(),
            TransportEvent::Message(raw) => self.on_message(&raw),
            TransportEvent::Error(detail) => {
                log::warn!("[session {}] Attempt {} error: {}", self.id, attempt, detail);
                if let Link::Open { failed, .. } = &mut self.link {
                    *failed = true;
                }
            }
            TransportEvent::Closed { code, reason } => self.on_closed(attempt, code, reason),
        }
    }

    fn on_opened(&mut self) {
        match std::mem::replace(&mut self.link, Link::Idle) {
            Link::Connecting { attempt, transport } => {
                log::info!("[session {}] Attempt {} open on {}", self.id, attempt, self.endpoint);
                self.consecutive_failures = 0;
                self.transition(Link::Open {
                    attempt,
                    transport,
                    awaiting_reply: false,
                    failed: false,
                });
            }
            other => self.link = other,
        }
    }

    fn on_message(&mut self, raw: &str) {
        let Link::Open { awaiting_reply, .. } = &mut self.link else {
            log::warn!("[session {}] Frame received before open; ignoring", self.id);
            return;
        };
        *awaiting_reply = false;

        match codec::decode(raw) {
            Ok(event) => {
                log::debug!("[session {}] Received frame ({} bytes)", self.id, raw.len());
                self.append(event);
            }
            Err(e) => {
                log::warn!("[session {}] Undecodable frame: {}", self.id, e);
                self.append(SessionEvent::warning(format!("Ignored frame: {e}")));
            }
        }
    }

    fn on_closed(&mut self, attempt: AttemptId, code: u16, reason: String) {
        // The attempt is over; its transport is dropped with the old link.
        let finished = std::mem::replace(&mut self.link, Link::Closed { retry: None });
        let undelivered = matches!(
            finished,
            Link::Open {
                awaiting_reply: true,
                failed: true,
                ..
            }
        );
        drop(finished);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let close = CloseReason {
            code,
            reason,
            consecutive_failures: self.consecutive_failures,
        };
        log::info!(
            "[session {}] Attempt {} closed (code {}: {})",
            self.id,
            attempt,
            close.code,
            close.reason
        );

        let mut cause = if close.reason.is_empty() {
            format!("code {}", close.code)
        } else {
            format!("code {}: {}", close.code, close.reason)
        };
        if undelivered {
            cause.push_str("; the last message may not have been delivered");
        }

        match self.policy.next_attempt_delay(&close) {
            RetryDecision::RetryAfter(delay) => {
                let timer = ReconnectTimer::arm(self.next_timer_id, delay, self.inbox_tx.clone());
                self.next_timer_id += 1;
                log::info!(
                    "[session {}] Reconnecting in {:.1}s (timer {})",
                    self.id,
                    timer.delay().as_secs_f32(),
                    timer.id()
                );
                self.append(SessionEvent::warning(format!(
                    "Disconnected ({cause}); reconnecting in {:.1}s",
                    delay.as_secs_f32()
                )));
                self.transition(Link::Closed { retry: Some(timer) });
            }
            RetryDecision::Stop => {
                log::warn!(
                    "[session {}] Reconnect policy stopped after {} failures",
                    self.id,
                    close.consecutive_failures
                );
                self.append(SessionEvent::warning(format!("Disconnected ({cause})")));
                self.append(SessionEvent::error(format!(
                    "Reconnection stopped after {} failed attempts",
                    close.consecutive_failures
                )));
                self.transition(Link::Closed { retry: None });
            }
        }
    }

    fn on_reconnect_due(&mut self, timer: u64) {
        match &self.link {
            Link::Closed { retry: Some(armed) } if armed.id() == timer => {
                log::info!("[session {}] Reconnect timer {} fired", self.id, timer);
                self.open_attempt();
            }
            _ => {
                log::debug!("[session {}] Ignoring stale reconnect timer {}", self.id, timer);
            }
        }
    }

    fn open_attempt(&mut self) {
        self.attempts += 1;
        let attempt = AttemptId(self.attempts);
        log::info!(
            "[session {}] Opening attempt {} to {}",
            self.id,
            attempt,
            self.endpoint
        );
        let events = EventSink::new(attempt, self.inbox_tx.clone());
        let transport = self.factory.open(&self.endpoint, events);
        self.transition(Link::Connecting { attempt, transport });
    }

    fn transition(&mut self, link: Link<F::Transport>) {
        self.link = link;
        let state = self.state();
        self.subscribers.notify(&SessionUpdate::StateChanged(state));
    }

    fn append(&mut self, event: SessionEvent) {
        let entry = self.log.append(event).clone();
        self.subscribers.notify(&SessionUpdate::Appended(entry));
    }
}

impl<F: TransportFactory> Drop for SessionController<F> {
    fn drop(&mut self) {
        self.dispose();
    }
}
