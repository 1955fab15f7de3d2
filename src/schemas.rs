//! # Schemas Module
//!
//! Wire-level shapes shared by the request builder and the frame decoder.
//!
//! Requests carry a list of role/content [`Message`]s. Responses are read
//! leniently as untyped JSON because providers disagree on the exact frame
//! layout; only the pieces below are interpreted:
//!
//! ```text
//! { "completed": true }                                   -> end of stream
//! { "choices": [ { "delta":   { "content": "..." } } ] }  -> streamed delta
//! { "choices": [ { "message": { "content": "..." } } ] }  -> whole message
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A chat message, passed to the service verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// True when the frame carries a boolean `completed` field set to `true`.
pub fn is_completion_frame(frame: &Value) -> bool {
    matches!(frame.get("completed"), Some(Value::Bool(true)))
}

/// Content fragment of a frame.
///
/// Looks at `choices[0].delta.content` first and falls back to
/// `choices[0].message.content` only when the delta path is absent. Empty
/// strings and `null` yield `None`; other scalars are rendered as JSON text.
pub fn frame_content(frame: &Value) -> Option<String> {
    let choice = frame.get("choices").and_then(|choices| choices.get(0));

    let content = choice
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .or_else(|| {
            choice
                .and_then(|c| c.get("message"))
                .and_then(|m| m.get("content"))
        })?;

    let text = match content {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
