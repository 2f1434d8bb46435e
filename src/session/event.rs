//! Session events and log entries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// How serious a [`SessionEvent::SystemNotice`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Something was ignored or degraded; the session carries on.
    Warning,
    /// Something failed: a backend error, a send that did not happen.
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One typed entry in the session log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Text the user submitted, recorded whether or not it was delivered.
    UserInput {
        /// The submitted text, as given.
        text: String,
    },
    /// A `response` frame from the backend.
    AssistantMessage {
        /// Reply text (markdown as produced by the backend).
        text: String,
    },
    /// A `tool_call` frame. Arguments are passed through untouched.
    ToolCall {
        /// Tool being invoked.
        tool_name: String,
        /// Opaque arguments.
        arguments: Value,
    },
    /// A `tool_result` frame.
    ToolResult {
        /// Tool that produced the result.
        tool_name: String,
        /// Result rendered as text.
        result: String,
    },
    /// Locally synthesized notice, or a backend `error` frame.
    SystemNotice {
        /// Human-readable description.
        text: String,
        /// Warning or error.
        severity: Severity,
    },
}

impl SessionEvent {
    /// Build a warning notice.
    pub fn warning(text: impl Into<String>) -> Self {
        Self::SystemNotice {
            text: text.into(),
            severity: Severity::Warning,
        }
    }

    /// Build an error notice.
    pub fn error(text: impl Into<String>) -> Self {
        Self::SystemNotice {
            text: text.into(),
            severity: Severity::Error,
        }
    }

    /// Severity if this is a notice.
    #[must_use]
    pub fn severity(&self) -> Option<Severity> {
        match self {
            Self::SystemNotice { severity, .. } => Some(*severity),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserInput { text } => write!(f, "you: {text}"),
            Self::AssistantMessage { text } => write!(f, "assistant: {text}"),
            Self::ToolCall {
                tool_name,
                arguments,
            } => {
                let pretty = serde_json::to_string_pretty(arguments)
                    .unwrap_or_else(|_| arguments.to_string());
                write!(f, "tool call {tool_name}: {pretty}")
            }
            Self::ToolResult { tool_name, result } => {
                write!(f, "tool result {tool_name}: {result}")
            }
            Self::SystemNotice { text, severity } => write!(f, "[{severity}] {text}"),
        }
    }
}

/// A log slot: the event plus where and when it landed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Position in the session, increasing across `clear()`.
    pub seq: u64,
    /// When the controller appended it.
    pub at: DateTime<Utc>,
    /// The event itself.
    pub event: SessionEvent,
}
