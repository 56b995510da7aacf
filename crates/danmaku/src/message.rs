//! Danmu message type.
//!
//! The decoded form of a single chat event pushed by a producer.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Sender name used when the producer omits one.
pub const UNKNOWN_SENDER: &str = "unknown";

/// A single decoded danmu message.
///
/// Immutable once constructed: fields are only reachable through accessors,
/// and the human-readable rendering is computed once in [`DanmuMessage::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanmuMessage {
    /// Display name of the sender
    sender: String,
    /// Message body
    content: String,
    /// Producer-supplied time token, kept verbatim
    timestamp: String,
    /// Identifier of the originating broadcast
    live_id: String,
    /// Opaque per-user identifier
    user_token: String,
    /// `[timestamp] sender [user_token]\ncontent`
    formatted: String,
    /// When the relay accepted the message
    received_at: DateTime<Utc>,
}

impl DanmuMessage {
    /// Create a new message, deriving the formatted rendering.
    pub fn new(
        sender: impl Into<String>,
        content: impl Into<String>,
        timestamp: impl Into<String>,
        live_id: impl Into<String>,
        user_token: impl Into<String>,
    ) -> Self {
        let sender = sender.into();
        let content = content.into();
        let timestamp = timestamp.into();
        let user_token = user_token.into();
        let formatted = format!("[{timestamp}] {sender} [{user_token}]\n{content}");

        Self {
            sender,
            content,
            timestamp,
            live_id: live_id.into(),
            user_token,
            formatted,
            received_at: Utc::now(),
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn live_id(&self) -> &str {
        &self.live_id
    }

    pub fn user_token(&self) -> &str {
        &self.user_token
    }

    pub fn formatted(&self) -> &str {
        &self.formatted
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted_rendering() {
        let msg = DanmuMessage::new("bob", "hello", "12:00:01", "live-1", "tok");

        assert_eq!(msg.sender(), "bob");
        assert_eq!(msg.content(), "hello");
        assert_eq!(msg.timestamp(), "12:00:01");
        assert_eq!(msg.live_id(), "live-1");
        assert_eq!(msg.user_token(), "tok");
        assert_eq!(msg.formatted(), "[12:00:01] bob [tok]\nhello");
    }

    #[test]
    fn test_formatted_keeps_separators_for_empty_fields() {
        let msg = DanmuMessage::new(UNKNOWN_SENDER, "", "", "", "");
        assert_eq!(msg.formatted(), "[] unknown []\n");
    }

    #[test]
    fn test_serialization_uses_snake_case() {
        let msg = DanmuMessage::new("alice", "hi", "1700000000000", "42", "u-1");
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["sender"], "alice");
        assert_eq!(json["live_id"], "42");
        assert_eq!(json["user_token"], "u-1");
        assert_eq!(json["formatted"], "[1700000000000] alice [u-1]\nhi");
        assert!(json.get("received_at").is_some());
    }
}
