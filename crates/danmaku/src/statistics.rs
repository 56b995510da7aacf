//! Intake statistics.
//!
//! Counts what happened to every frame the relay has seen, so that
//! "skipped because not a chat event" stays distinguishable from
//! "dropped because malformed" for whoever consumes the numbers.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::Decoded;
use crate::error::{DanmakuError, Result};

/// Point-in-time copy of the intake counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeSnapshot {
    /// Frames decoded into a message and retained
    pub accepted: u64,
    /// Well-formed frames that were not chat events
    pub skipped: u64,
    /// Frames that were not valid JSON
    pub parse_errors: u64,
    /// Frames with an unexpected JSON shape
    pub shape_errors: u64,
    /// `parse_errors + shape_errors`
    pub rejected: u64,
    /// Sessions accepted since start
    pub sessions_opened: u64,
    /// Sessions that have ended
    pub sessions_closed: u64,
    /// Sessions that ended on a transport fault
    pub transport_faults: u64,
    /// `sessions_opened - sessions_closed`
    pub active_sessions: u64,
    /// When counting started
    pub started_at: DateTime<Utc>,
}

/// Lock-free intake counters shared by all sessions.
#[derive(Debug)]
pub struct IntakeStatistics {
    accepted: AtomicU64,
    skipped: AtomicU64,
    parse_errors: AtomicU64,
    shape_errors: AtomicU64,
    sessions_opened: AtomicU64,
    sessions_closed: AtomicU64,
    transport_faults: AtomicU64,
    started_at: DateTime<Utc>,
}

impl IntakeStatistics {
    pub fn new() -> Self {
        Self {
            accepted: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            shape_errors: AtomicU64::new(0),
            sessions_opened: AtomicU64::new(0),
            sessions_closed: AtomicU64::new(0),
            transport_faults: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    /// Classify and count a decode outcome.
    pub fn record_decode(&self, outcome: &Result<Decoded>) {
        let counter = match outcome {
            Ok(Decoded::Danmu(_)) => &self.accepted,
            Ok(Decoded::NotApplicable) => &self.skipped,
            Err(DanmakuError::Parse(_)) => &self.parse_errors,
            Err(DanmakuError::Shape(_)) => &self.shape_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a finished session, noting whether it ended on a transport fault.
    pub fn record_session_closed(&self, faulted: bool) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
        if faulted {
            self.transport_faults.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn active_sessions(&self) -> u64 {
        let opened = self.sessions_opened.load(Ordering::Relaxed);
        let closed = self.sessions_closed.load(Ordering::Relaxed);
        opened.saturating_sub(closed)
    }

    /// Get current counters.
    pub fn snapshot(&self) -> IntakeSnapshot {
        let parse_errors = self.parse_errors.load(Ordering::Relaxed);
        let shape_errors = self.shape_errors.load(Ordering::Relaxed);
        let sessions_opened = self.sessions_opened.load(Ordering::Relaxed);
        let sessions_closed = self.sessions_closed.load(Ordering::Relaxed);

        IntakeSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            parse_errors,
            shape_errors,
            rejected: parse_errors + shape_errors,
            sessions_opened,
            sessions_closed,
            transport_faults: self.transport_faults.load(Ordering::Relaxed),
            active_sessions: sessions_opened.saturating_sub(sessions_closed),
            started_at: self.started_at,
        }
    }
}

impl Default for IntakeStatistics {
    fn default() -> Self {
        Self::new()
    }
}
