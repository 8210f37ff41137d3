//! Bounded, newest-first event buffer

use std::collections::VecDeque;

use crate::models::LiveEvent;

pub const DEFAULT_CAPACITY: usize = 1000;

/// Newest-first event buffer that silently drops the oldest entries
/// once it grows past its capacity.
#[derive(Debug, Clone)]
pub struct EventBuffer {
    events: VecDeque<LiveEvent>,
    capacity: usize,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        EventBuffer {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        }
    }

    /// Put a batch in front of everything already buffered, keeping the
    /// batch's own order, then truncate to capacity.
    ///
    /// Returns how many events were dropped from the tail.
    pub fn prepend(&mut self, batch: Vec<LiveEvent>) -> usize {
        for event in batch.into_iter().rev() {
            self.events.push_front(event);
        }
        let dropped = self.events.len().saturating_sub(self.capacity);
        self.events.truncate(self.capacity);
        dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &LiveEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn newest(&self) -> Option<&LiveEvent> {
        self.events.front()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a EventBuffer {
    type Item = &'a LiveEvent;
    type IntoIter = std::collections::vec_deque::Iter<'a, LiveEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
