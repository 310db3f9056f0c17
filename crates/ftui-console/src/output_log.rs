//! Bounded scrollback shared between the worker and the interactive thread.
//!
//! The log is a `VecDeque` behind a mutex: the worker appends while the
//! interactive side takes snapshots for rendering. Every operation holds the
//! lock for its whole duration, so a snapshot never observes a half-applied
//! append or eviction.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::record::OutputRecord;

#[derive(Debug)]
struct LogInner {
    records: VecDeque<OutputRecord>,
    total_appended: u64,
}

/// Append-only record of everything displayed, evicting oldest-first.
#[derive(Debug)]
pub struct OutputLog {
    inner: Mutex<LogInner>,
    max_lines: usize,
}

impl OutputLog {
    /// Create a log that retains at most `max_lines` records.
    #[must_use]
    pub fn new(max_lines: usize) -> Self {
        Self {
            inner: Mutex::new(LogInner {
                records: VecDeque::with_capacity(max_lines.min(1024)),
                total_appended: 0,
            }),
            max_lines,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Append one record, evicting from the head while over capacity.
    pub fn append(&self, record: OutputRecord) {
        let mut inner = self.lock();
        inner.records.push_back(record);
        inner.total_appended += 1;
        while inner.records.len() > self.max_lines {
            inner.records.pop_front();
        }
    }

    /// Append several records under a single lock acquisition.
    pub fn extend(&self, records: impl IntoIterator<Item = OutputRecord>) {
        let mut inner = self.lock();
        for record in records {
            inner.records.push_back(record);
            inner.total_appended += 1;
        }
        while inner.records.len() > self.max_lines {
            inner.records.pop_front();
        }
    }

    /// The most recent `limit` records (all of them when `limit` is `None`),
    /// oldest first.
    #[must_use]
    pub fn snapshot(&self, limit: Option<usize>) -> Vec<OutputRecord> {
        let inner = self.lock();
        let len = inner.records.len();
        let skip = limit.map_or(0, |limit| len.saturating_sub(limit));
        inner.records.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().records.clear();
    }

    /// Empty the log and append `records` under one lock acquisition, so no
    /// snapshot sees the log empty in between.
    pub fn replace_with(&self, records: impl IntoIterator<Item = OutputRecord>) {
        let mut inner = self.lock();
        inner.records.clear();
        for record in records {
            inner.records.push_back(record);
            inner.total_appended += 1;
        }
        while inner.records.len() > self.max_lines {
            inner.records.pop_front();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Number of records appended over the log's lifetime, evicted ones included.
    #[must_use]
    pub fn total_appended(&self) -> u64 {
        self.lock().total_appended
    }
}
