//! danmu-relay library crate.
//!
//! Accepts WebSocket connections from danmu producers, decodes each frame
//! and keeps the most recent messages in a shared [`danmaku::RetentionBuffer`].
//! An optional HTTP API exposes the buffer to downstream consumers.

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;

pub use error::{Error, Result};
