//! Append-only event log.

use chrono::Utc;

use super::event::{LogEntry, SessionEvent};

/// Ordered session log. Insertion order is arrival order.
#[derive(Debug, Default)]
pub(crate) struct EventLog {
    entries: Vec<LogEntry>,
    next_seq: u64,
}

impl EventLog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append and return the stored entry.
    pub(crate) fn append(&mut self, event: SessionEvent) -> &LogEntry {
        let entry = LogEntry {
            seq: self.next_seq,
            at: Utc::now(),
            event,
        };
        self.next_seq += 1;
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    /// Drop every entry. Sequence numbers keep counting.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn entries(&self) -> &[LogEntry] {
        &self.entries
    }
}
