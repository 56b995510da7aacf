//! Danmu ingestion over WebSocket.
//!
//! The [`IngestListener`] accepts producer connections and runs one
//! [`Session`] per connection. Sessions decode every frame and push
//! accepted messages into the shared retention buffer.

pub mod listener;
pub mod session;

use std::time::Duration;

use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

pub use listener::IngestListener;
pub use session::{CloseReason, FrameOutcome, Session, SessionState};

/// Ingest listener configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Listener bind address
    pub bind_address: String,
    /// Listener port (0 picks a free port)
    pub port: u16,
    /// Largest accepted message or frame, in bytes
    pub max_message_size: usize,
    /// How long shutdown waits for open sessions to close
    pub shutdown_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8765,
            max_message_size: 1024 * 1024, // 1 MiB
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl IngestConfig {
    /// Protocol settings applied to every accepted connection.
    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig::default()
            .max_message_size(Some(self.max_message_size))
            .max_frame_size(Some(self.max_message_size))
    }
}
