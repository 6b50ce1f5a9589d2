//! Decision history - fixed-capacity ring of recent decisions.
//!
//! Backed by a pre-sized slot vector indexed modulo capacity; once full, each
//! push overwrites the oldest entry. Used for observability only.

use crate::domain::Decision;

/// Default number of decisions kept in memory.
pub const DEFAULT_HISTORY_CAP: usize = 100;

/// FIFO ring buffer of decisions
#[derive(Debug, Clone)]
pub struct HistoryRing {
    slots: Vec<Option<Decision>>,
    /// Next slot to write
    head: usize,
    len: usize,
}

impl HistoryRing {
    /// Create a ring holding at most `capacity` decisions (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![None; capacity],
            head: 0,
            len: 0,
        }
    }

    /// Append a decision, returning the evicted one when full
    pub fn push(&mut self, decision: Decision) -> Option<Decision> {
        let evicted = self.slots[self.head].replace(decision);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Decision> {
        let capacity = self.capacity();
        let start = (self.head + capacity - self.len) % capacity;
        (0..self.len).filter_map(move |i| self.slots[(start + i) % capacity].as_ref())
    }

    /// Oldest retained decision
    pub fn oldest(&self) -> Option<&Decision> {
        self.iter().next()
    }

    /// Most recent decision
    pub fn newest(&self) -> Option<&Decision> {
        if self.len == 0 {
            return None;
        }
        let capacity = self.capacity();
        self.slots[(self.head + capacity - 1) % capacity].as_ref()
    }

    /// The last `n` decisions, oldest to newest
    pub fn tail(&self, n: usize) -> Vec<Decision> {
        let skip = self.len.saturating_sub(n);
        self.iter().skip(skip).cloned().collect()
    }

    /// Copy of the whole ring, oldest to newest
    pub fn to_vec(&self) -> Vec<Decision> {
        self.iter().cloned().collect()
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}
