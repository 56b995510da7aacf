//! Bounded retention of recent danmu messages.
//!
//! A fixed-capacity FIFO: once full, every push evicts the oldest entry.
//! The buffer is shared between all connection sessions, so every
//! operation runs inside a single critical section.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::message::DanmuMessage;

/// Default number of retained messages.
pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug)]
struct Inner {
    messages: VecDeque<DanmuMessage>,
    total_pushed: u64,
}

/// Fixed-capacity, insertion-ordered store of the most recent messages.
///
/// All read accessors return entries oldest-first.
#[derive(Debug)]
pub struct RetentionBuffer {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl RetentionBuffer {
    /// Create an empty buffer. A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                messages: VecDeque::with_capacity(capacity),
                total_pushed: 0,
            }),
        }
    }

    /// Append a message, returning the evicted oldest entry when full.
    pub fn push(&self, message: DanmuMessage) -> Option<DanmuMessage> {
        let mut inner = self.inner.lock();
        let evicted = if inner.messages.len() >= self.capacity {
            inner.messages.pop_front()
        } else {
            None
        };
        inner.messages.push_back(message);
        inner.total_pushed += 1;
        evicted
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<DanmuMessage> {
        self.inner.lock().messages.iter().cloned().collect()
    }

    /// The newest `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<DanmuMessage> {
        let inner = self.inner.lock();
        let skip = inner.messages.len().saturating_sub(n);
        inner.messages.iter().skip(skip).cloned().collect()
    }

    /// The most recently pushed message.
    pub fn latest(&self) -> Option<DanmuMessage> {
        self.inner.lock().messages.back().cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pushes since creation, including evicted entries.
    pub fn total_pushed(&self) -> u64 {
        self.inner.lock().total_pushed
    }
}

impl Default for RetentionBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
