//! Danmu frame codec.
//!
//! Decodes one raw frame into a [`DanmuMessage`]. The expected payload is:
//!
//! ```json
//! { "type": "danmu",
//!   "data": { "nickname": "...", "content": "...", "time": "...",
//!             "liveId": "...", "userToken": "..." } }
//! ```
//!
//! Decoding has three distinct outcomes: a message, a benign skip for
//! well-formed frames that are not chat events, and an error for frames
//! that are malformed. Callers log the last one and ignore the second.

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{DanmakuError, Result};
use crate::message::{DanmuMessage, UNKNOWN_SENDER};

/// Frame `type` carried by chat events.
const DANMU_TYPE: &str = "danmu";

/// Successful decode outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A chat event ready to be retained.
    Danmu(DanmuMessage),
    /// Well-formed frame that is not a chat event, or carries no payload.
    NotApplicable,
}

impl Decoded {
    /// Get the decoded message, if any.
    pub fn into_message(self) -> Option<DanmuMessage> {
        match self {
            Self::Danmu(msg) => Some(msg),
            Self::NotApplicable => None,
        }
    }
}

/// Decode a raw frame payload.
///
/// Text and binary frames are both passed in as bytes; invalid UTF-8 is
/// reported as a parse error.
pub fn decode(raw: &[u8]) -> Result<Decoded> {
    let value: Value = serde_json::from_slice(raw)?;

    let Value::Object(frame) = value else {
        return Err(DanmakuError::shape(format!(
            "expected object at top level, found {}",
            kind_of(&value)
        )));
    };

    let kind = frame.get("type").and_then(Value::as_str);
    if kind != Some(DANMU_TYPE) {
        trace!(kind = ?kind, "Skipping non-danmu frame");
        return Ok(Decoded::NotApplicable);
    }

    let data = match frame.get("data") {
        Some(value) if !is_empty(value) && !value.is_object() => {
            return Err(DanmakuError::shape(format!(
                "expected object for `data`, found {}",
                kind_of(value)
            )));
        }
        Some(Value::Object(data)) if !data.is_empty() => data,
        _ => {
            trace!("Skipping danmu frame without payload");
            return Ok(Decoded::NotApplicable);
        }
    };

    let sender = text_field(data, "nickname")
        .or_else(|| text_field(data, "sender"))
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

    Ok(Decoded::Danmu(DanmuMessage::new(
        sender,
        text_field(data, "content").unwrap_or_default(),
        text_field(data, "time").unwrap_or_default(),
        text_field(data, "liveId").unwrap_or_default(),
        text_field(data, "userToken").unwrap_or_default(),
    )))
}

/// Read a field as text. `null` counts as absent.
///
/// Producers send `time` as epoch milliseconds, so scalars are rendered
/// with their JSON text rather than rejected.
fn text_field(data: &Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Falsy payloads are treated the same as a missing one.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
