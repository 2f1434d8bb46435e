//! Wire codec for the streaming chat protocol.
//!
//! Inbound frames are single JSON objects discriminated by `type`:
//!
//! | `type`        | fields              | decoded as                 |
//! |---------------|---------------------|----------------------------|
//! | `tool_call`   | `tool`, `arguments` | [`SessionEvent::ToolCall`] |
//! | `tool_result` | `tool`, `result`    | [`SessionEvent::ToolResult`] |
//! | `response`    | `content`           | [`SessionEvent::AssistantMessage`] |
//! | `error`       | `content`           | [`SessionEvent::SystemNotice`] (error) |
//!
//! Anything else is a [`DecodeError`]. The controller turns those into
//! warning notices; they never tear down the connection.
//!
//! The only outbound shape is `{"message": "<user text>"}`.

use serde::Deserialize;
use serde_json::Value;

use crate::session::{SessionEvent, Severity};

/// Why an inbound frame could not be turned into an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Frame is not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Frame is JSON but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// Object has no string `type` field.
    #[error("frame has no `type` discriminator")]
    MissingType,

    /// `type` names a frame this protocol version does not know.
    #[error("unrecognized frame type `{0}`")]
    UnknownType(String),

    /// Known `type`, but a required field is missing or mistyped.
    #[error("invalid `{kind}` frame: {detail}")]
    InvalidFields {
        /// The frame's `type` value.
        kind: String,
        /// serde's description of the problem.
        detail: String,
    },
}

#[derive(Debug, Deserialize)]
struct ToolCallFrame {
    tool: String,
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ToolResultFrame {
    tool: String,
    result: Value,
}

#[derive(Debug, Deserialize)]
struct ContentFrame {
    content: String,
}

/// Decode one raw inbound frame into a session event.
pub fn decode(raw: &str) -> Result<SessionEvent, DecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let Value::Object(ref object) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?
        .to_string();

    match kind.as_str() {
        "tool_call" => {
            let frame: ToolCallFrame = fields(&kind, value)?;
            Ok(SessionEvent::ToolCall {
                tool_name: frame.tool,
                arguments: frame.arguments,
            })
        }
        "tool_result" => {
            let frame: ToolResultFrame = fields(&kind, value)?;
            Ok(SessionEvent::ToolResult {
                tool_name: frame.tool,
                result: opaque_text(frame.result),
            })
        }
        "response" => {
            let frame: ContentFrame = fields(&kind, value)?;
            Ok(SessionEvent::AssistantMessage {
                text: frame.content,
            })
        }
        "error" => {
            let frame: ContentFrame = fields(&kind, value)?;
            Ok(SessionEvent::SystemNotice {
                text: format!("Error: {}", frame.content),
                severity: Severity::Error,
            })
        }
        _ => Err(DecodeError::UnknownType(kind)),
    }
}

/// Encode user text as the outbound request frame.
pub fn encode(text: &str) -> String {
    serde_json::json!({ "message": text }).to_string()
}

fn fields<T: for<'de> Deserialize<'de>>(kind: &str, value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|e| DecodeError::InvalidFields {
        kind: kind.to_string(),
        detail: e.to_string(),
    })
}

/// Strings pass through verbatim; anything else is rendered as compact JSON.
fn opaque_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
