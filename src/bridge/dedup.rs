//! Bounded recency set of recently relayed message texts.
//!
//! Eviction is strict FIFO: a text that is seen again does not move back to
//! the front, so it falls out after `capacity` newer distinct insertions.

use std::collections::{HashSet, VecDeque};

/// Default number of recent messages remembered.
pub const DEFAULT_DEDUP_CAPACITY: usize = 50;

#[derive(Debug)]
pub struct Deduplicator {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}

impl Deduplicator {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Returns `true` if `text` was seen recently. Otherwise records it and
    /// returns `false`.
    pub fn is_duplicate(&mut self, text: &str) -> bool {
        if self.seen.contains(text) {
            return true;
        }

        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }

        self.order.push_back(text.to_string());
        self.seen.insert(text.to_string());
        false
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
