//! Danmaku: decoding and retention of live chat/comment (danmu/弹幕) events.
//!
//! This crate holds the transport-independent half of the ingestion pipeline.
//!
//! ## Core Types
//!
//! - [`DanmuMessage`] - A single decoded chat event
//! - [`Decoded`] - Codec outcome: a message or a benign skip
//! - [`RetentionBuffer`] - Bounded, insertion-ordered store of recent messages
//!
//! ## Statistics
//!
//! - [`IntakeStatistics`] - Counters for accepted, skipped and rejected frames
//! - [`IntakeSnapshot`] - Point-in-time copy of the counters

pub mod buffer;
pub mod codec;
pub mod error;
pub mod message;
pub mod statistics;

pub use buffer::{DEFAULT_CAPACITY, RetentionBuffer};
pub use codec::{Decoded, decode};
pub use error::{DanmakuError, Result};
pub use message::{DanmuMessage, UNKNOWN_SENDER};
pub use statistics::{IntakeSnapshot, IntakeStatistics};
