//! The agent-produced event stream, passed through unchanged by
//! orchestration. Defined here (rather than in `stream-broker`) because both
//! the SSE passthrough's terminal-event bookkeeping and a `TriggerAdapter`'s
//! `respond()` rendering need the same shape.
//!
//! The orchestration plane never constructs these from scratch — it only
//! forwards bytes the sandbox already produced — but having a typed shape
//! lets a trigger adapter deserialize a forwarded event without guessing at
//! field names, and lets tests assert on structure instead of raw strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single follow-up question surfaced by the agent via a `question` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionSpec {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// One event in an agent's progress stream.
///
/// Serializes adjacently-tagged as `{"type": "<tag>", "data": {...}}`, which
/// combined with the `thread_id` sibling field in [`StreamEventEnvelope`]
/// matches the wire framing in the spec's SSE section byte-for-byte.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    Thought {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
    },
    ToolStart {
        name: String,
        input: Value,
        tool_use_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
    },
    ToolEnd {
        name: String,
        tool_use_id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
    },
    Question {
        questions: Vec<QuestionSpec>,
    },
    QuestionTimeout {},
    Result {
        text: String,
        success: bool,
        subtype: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        images: Option<Vec<Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        files: Option<Vec<Value>>,
    },
    Error {
        message: String,
        recoverable: bool,
    },
}

impl StreamEvent {
    /// Whether this tag ends a stream per the end-of-stream policy: a
    /// `result` or `error` event is terminal, everything else is not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Result { .. } | StreamEvent::Error { .. })
    }

    /// The wire tag for this variant (`"thought"`, `"tool_start"`, ...).
    pub fn tag(&self) -> &'static str {
        match self {
            StreamEvent::Thought { .. } => "thought",
            StreamEvent::ToolStart { .. } => "tool_start",
            StreamEvent::ToolEnd { .. } => "tool_end",
            StreamEvent::Question { .. } => "question",
            StreamEvent::QuestionTimeout {} => "question_timeout",
            StreamEvent::Result { .. } => "result",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// Build the orchestrator-side `error{recoverable=false}` event emitted
    /// when an upstream stream closes before a terminal event.
    pub fn upstream_broken(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
            recoverable: false,
        }
    }
}

/// The full object that goes out on the wire for one SSE `data:` line:
/// the tagged event plus the `thread_id` it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamEventEnvelope {
    #[serde(flatten)]
    pub event: StreamEvent,
    pub thread_id: String,
}

impl StreamEventEnvelope {
    pub fn new(event: StreamEvent, thread_id: impl Into<String>) -> Self {
        Self {
            event,
            thread_id: thread_id.into(),
        }
    }

    /// Render as the exact `data: {...}\n\n` SSE frame this event occupies
    /// on the wire (used only for synthesizing the orchestrator's own
    /// `error` event; forwarded bytes are never round-tripped through this).
    pub fn to_sse_frame(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("data: {json}\n\n")
    }
}

/// Parse just enough of a raw `data:` line to learn whether it carries a
/// terminal event, without fully deserializing or mutating it. Used by the
/// SSE passthrough to decide clean-close vs. broken-stream — the line is
/// still forwarded byte-for-byte regardless of what this returns.
pub fn peek_is_terminal_data_line(line: &str) -> bool {
    let Some(json) = line.strip_prefix("data:") else {
        return false;
    };
    let Ok(value) = serde_json::from_str::<Value>(json.trim()) else {
        return false;
    };
    matches!(value.get("type").and_then(Value::as_str), Some("result") | Some("error"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_to_spec_wire_shape() {
        let envelope = StreamEventEnvelope::new(
            StreamEvent::Result {
                text: "done".into(),
                success: true,
                subtype: "final".into(),
                images: None,
                files: None,
            },
            "thread-abc",
        );
        let value: Value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["type"], "result");
        assert_eq!(value["thread_id"], "thread-abc");
        assert_eq!(value["data"]["success"], true);
    }

    #[test]
    fn terminal_detection_matches_result_and_error_only() {
        assert!(StreamEvent::Result {
            text: String::new(),
            success: true,
            subtype: String::new(),
            images: None,
            files: None,
        }
        .is_terminal());
        assert!(StreamEvent::Error {
            message: String::new(),
            recoverable: false,
        }
        .is_terminal());
        assert!(!StreamEvent::Thought { text: String::new(), parent_tool_use_id: None }.is_terminal());
        assert!(!StreamEvent::QuestionTimeout {}.is_terminal());
    }

    #[test]
    fn peek_detects_terminal_tags_without_mutating() {
        assert!(peek_is_terminal_data_line(
            r#"data: {"type":"result","data":{"text":"hi","success":true,"subtype":"final"},"thread_id":"t1"}"#
        ));
        assert!(peek_is_terminal_data_line(
            r#"data: {"type":"error","data":{"message":"boom","recoverable":false},"thread_id":"t1"}"#
        ));
        assert!(!peek_is_terminal_data_line(
            r#"data: {"type":"thought","data":{"text":"thinking"},"thread_id":"t1"}"#
        ));
        assert!(!peek_is_terminal_data_line("event: ping"));
    }
}
