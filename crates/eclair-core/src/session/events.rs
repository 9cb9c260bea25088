//! Stream events and normalization of raw engine events

use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};

/// Status message emitted at the start of a turn
pub const STATUS_PROCESSING: &str = "processing";
/// Message carried by the final event of a successful turn
pub const COMPLETE_MESSAGE: &str = "complete";
/// Error message for blank turn input
pub const EMPTY_INPUT_MESSAGE: &str = "empty input";

/// What happened, as seen by the display layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Response text fragment
    Text { content: String },
    /// Tool invocation, with its result once known
    ToolUse {
        name: String,
        arguments: Map<String, Value>,
        result: Option<Value>,
    },
    Error { message: String },
    Status { message: String },
    /// End of a turn
    Complete { message: String },
}

/// One unit of a turn's output
#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    #[serde(flatten)]
    pub kind: EventKind,
    /// Monotonic creation time
    #[serde(skip)]
    pub created_at: Instant,
}

impl StreamEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            created_at: Instant::now(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(EventKind::Text {
            content: content.into(),
        })
    }

    pub fn tool_use(
        name: impl Into<String>,
        arguments: Map<String, Value>,
        result: Option<Value>,
    ) -> Self {
        Self::new(EventKind::ToolUse {
            name: name.into(),
            arguments,
            result,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventKind::Error {
            message: message.into(),
        })
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::new(EventKind::Status {
            message: message.into(),
        })
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(EventKind::Complete {
            message: message.into(),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, EventKind::Error { .. })
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.kind, EventKind::Complete { .. })
    }
}

/// Raw engine event, classified once at the boundary
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    Text {
        text: Option<String>,
        source: Value,
    },
    ToolUse {
        tool_name: Option<String>,
        arguments: Option<Map<String, Value>>,
        result: Option<Value>,
    },
    Error {
        message: Option<String>,
        source: Value,
    },
    /// Missing or unknown `type`
    Unrecognized(Value),
}

#[derive(Debug, thiserror::Error)]
pub enum EventConversionError {
    #[error("field '{field}' must be {expected}, got {found}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
        found: String,
    },
}

impl RawEvent {
    pub fn classify(value: Value) -> Result<Self, EventConversionError> {
        let event_type = match value.get("type") {
            None | Some(Value::Null) => None,
            Some(Value::String(t)) => Some(t.clone()),
            Some(other) => {
                return Err(EventConversionError::FieldType {
                    field: "type",
                    expected: "a string",
                    found: other.to_string(),
                })
            }
        };

        let event = match event_type.as_deref() {
            Some("text") => RawEvent::Text {
                text: string_field(&value, "text")?,
                source: value,
            },
            Some("tool_use") => RawEvent::ToolUse {
                tool_name: string_field(&value, "tool_name")?,
                arguments: object_field(&value, "arguments")?,
                result: value.get("result").filter(|r| !r.is_null()).cloned(),
            },
            Some("error") => RawEvent::Error {
                message: string_field(&value, "message")?,
                source: value,
            },
            _ => RawEvent::Unrecognized(value),
        };

        Ok(event)
    }

    pub fn into_stream_event(self) -> StreamEvent {
        match self {
            RawEvent::Text { text, source } => {
                StreamEvent::text(text.unwrap_or_else(|| source.to_string()))
            }
            RawEvent::ToolUse {
                tool_name,
                arguments,
                result,
            } => StreamEvent::tool_use(
                tool_name.unwrap_or_else(|| "unknown".to_string()),
                arguments.unwrap_or_default(),
                result,
            ),
            RawEvent::Error { message, source } => {
                StreamEvent::error(message.unwrap_or_else(|| source.to_string()))
            }
            RawEvent::Unrecognized(value) => StreamEvent::text(value.to_string()),
        }
    }
}

/// Non-empty string field, `None` when absent, null, or empty
fn string_field(
    value: &Value,
    field: &'static str,
) -> Result<Option<String>, EventConversionError> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(EventConversionError::FieldType {
            field,
            expected: "a string",
            found: other.to_string(),
        }),
    }
}

fn object_field(
    value: &Value,
    field: &'static str,
) -> Result<Option<Map<String, Value>>, EventConversionError> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(other) => Err(EventConversionError::FieldType {
            field,
            expected: "an object",
            found: other.to_string(),
        }),
    }
}

/// Map a raw engine event to a stream event. Never fails: conversion
/// problems become an `Error` event.
pub fn normalize(raw: Value) -> StreamEvent {
    match RawEvent::classify(raw) {
        Ok(event) => event.into_stream_event(),
        Err(e) => StreamEvent::error(format!("Failed to convert stream event: {}", e)),
    }
}
