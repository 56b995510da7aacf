//! Relay error types.

use thiserror::Error;

/// Relay result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while running the relay.
#[derive(Error, Debug)]
pub enum Error {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A log filter directive could not be parsed.
    #[error("Invalid log filter: {0}")]
    LogFilter(String),

    /// The tracing subscriber could not be installed or reloaded.
    #[error("Logging error: {0}")]
    Logging(String),

    #[error("HTTP server error: {0}")]
    Api(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether the error was caused by caller input rather than the relay itself.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::LogFilter(_))
    }
}
