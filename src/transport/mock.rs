//! In-memory transport for controller tests.
//!
//! Records every `open`, `send` and `close` and lets the test inject
//! transport events for any attempt it created.

use std::sync::{Arc, Mutex};

use super::{EventSink, Transport, TransportError, TransportEvent, TransportFactory};

#[derive(Debug)]
struct MockAttempt {
    url: String,
    events: EventSink,
    sent: Vec<String>,
    close_calls: usize,
}

#[derive(Debug, Default)]
struct MockState {
    attempts: Vec<MockAttempt>,
    fail_sends: Option<String>,
}

/// Factory handing out [`MockTransport`]s. Clones share recorded state.
#[derive(Debug, Default, Clone)]
pub(crate) struct MockFactory {
    state: Arc<Mutex<MockState>>,
}

impl MockFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of `open` calls so far.
    pub(crate) fn opens(&self) -> usize {
        self.state.lock().unwrap().attempts.len()
    }

    /// URL passed to the `index`-th `open`.
    pub(crate) fn url(&self, index: usize) -> String {
        self.state.lock().unwrap().attempts[index].url.clone()
    }

    /// Frames sent through the `index`-th attempt.
    pub(crate) fn sent(&self, index: usize) -> Vec<String> {
        self.state.lock().unwrap().attempts[index].sent.clone()
    }

    /// Frames sent across all attempts.
    pub(crate) fn total_sent(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .attempts
            .iter()
            .map(|a| a.sent.len())
            .sum()
    }

    /// `close` calls made on the `index`-th attempt.
    pub(crate) fn close_calls(&self, index: usize) -> usize {
        self.state.lock().unwrap().attempts[index].close_calls
    }

    /// Make every subsequent `send` fail with `reason`.
    pub(crate) fn fail_sends(&self, reason: &str) {
        self.state.lock().unwrap().fail_sends = Some(reason.to_string());
    }

    /// Inject an event as if the `index`-th attempt had raised it.
    pub(crate) fn emit(&self, index: usize, event: TransportEvent) {
        assert!(self.try_emit(index, event), "session inbox closed");
    }

    /// Like [`emit`](Self::emit), but reports whether the session was listening.
    pub(crate) fn try_emit(&self, index: usize, event: TransportEvent) -> bool {
        let events = self.state.lock().unwrap().attempts[index].events.clone();
        events.emit(event)
    }
}

impl TransportFactory for MockFactory {
    type Transport = MockTransport;

    fn open(&mut self, url: &str, events: EventSink) -> MockTransport {
        let mut state = self.state.lock().unwrap();
        state.attempts.push(MockAttempt {
            url: url.to_string(),
            events,
            sent: Vec::new(),
            close_calls: 0,
        });
        MockTransport {
            index: state.attempts.len() - 1,
            state: Arc::clone(&self.state),
        }
    }
}

/// Transport that only records calls.
#[derive(Debug)]
pub(crate) struct MockTransport {
    index: usize,
    state: Arc<Mutex<MockState>>,
}

impl Transport for MockTransport {
    fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = state.fail_sends.clone() {
            return Err(TransportError::SendFailed(reason));
        }
        state.attempts[self.index].sent.push(frame.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().unwrap().attempts[self.index].close_calls += 1;
    }
}
