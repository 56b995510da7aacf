//! Danmaku error types.

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, DanmakuError>;

/// Errors that can occur while decoding a danmu frame.
///
/// A frame that is well formed but simply not a chat event is not an error;
/// see [`crate::Decoded::NotApplicable`].
#[derive(Error, Debug)]
pub enum DanmakuError {
    /// The payload is not well-formed JSON (or not valid UTF-8).
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The payload parsed but has an unexpected shape.
    #[error("Shape error: {0}")]
    Shape(String),
}

impl DanmakuError {
    /// Create a shape error.
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    /// Whether this is a syntax-level failure.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}
