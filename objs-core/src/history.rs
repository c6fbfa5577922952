/*!
Bounded snapshot history of one tracked value.
*/

use crate::value::Value;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// One stored clone of a tracked value
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// The clone itself, never handed out for mutation by the Snapshotter
    pub snapshot: Value,

    /// Sequence number of this entry within its history (1, 2, 3, ...)
    pub version: u64,

    /// UTC time at which the clone was taken
    pub saved_at: DateTime<Utc>,
}

impl HistoryEntry {
    fn new(snapshot: Value, version: u64) -> Self {
        Self {
            snapshot,
            version,
            saved_at: Utc::now(),
        }
    }
}

/// Newest-first sequence of snapshots, never longer than its depth.
///
/// # Example
/// ```rust
/// use objs_core::{History, Value};
///
/// let mut history = History::new(2);
/// history.push(Value::from(1));
/// history.push(Value::from(2));
/// let evicted = history.push(Value::from(3));
///
/// assert_eq!(history.len(), 2);
/// assert_eq!(evicted.and_then(|entry| entry.snapshot.as_f64()), Some(1.0));
/// assert_eq!(history.latest().and_then(|entry| entry.snapshot.as_f64()), Some(3.0));
/// ```
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    depth: usize,
    next_version: u64,
}

impl History {
    /// Create an empty history keeping at most `depth` entries (at least one).
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            entries: VecDeque::with_capacity(depth),
            depth,
            next_version: 1,
        }
    }

    /// Create a history holding a single snapshot
    pub fn seeded(depth: usize, snapshot: Value) -> Self {
        let mut history = Self::new(depth);
        history.push(snapshot);
        history
    }

    /// Prepend a snapshot, returning the oldest entry if the depth is exceeded
    pub fn push(&mut self, snapshot: Value) -> Option<HistoryEntry> {
        let entry = HistoryEntry::new(snapshot, self.next_version);
        self.next_version += 1;
        self.entries.push_front(entry);

        if self.entries.len() > self.depth {
            self.entries.pop_back()
        } else {
            None
        }
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn pop_latest(&mut self) -> Option<HistoryEntry> {
        self.entries.pop_front()
    }

    /// Drop every entry and keep only the given snapshot.
    ///
    /// Versions keep increasing across resets.
    pub fn reset_to(&mut self, snapshot: Value) {
        self.entries.clear();
        self.push(snapshot);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from newest to oldest
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}
