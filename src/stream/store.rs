//! State container for the live pipeline
//!
//! Holds the buffer, the stream statistics and the filter selections,
//! independent of whatever renders them.

use crate::filter::FilterState;
use crate::models::{LiveEvent, StreamStats};

use super::buffer::EventBuffer;

#[derive(Debug, Clone, Default)]
pub struct LiveStore {
    buffer: EventBuffer,
    stats: StreamStats,
    filter: FilterState,
}

impl LiveStore {
    pub fn new(capacity: usize) -> Self {
        LiveStore {
            buffer: EventBuffer::with_capacity(capacity),
            stats: StreamStats::new(),
            filter: FilterState::new(),
        }
    }

    pub fn with_filter(mut self, filter: FilterState) -> Self {
        self.filter = filter;
        self
    }

    /// Ingest a batch of live events: count them, replace the rate,
    /// then prepend them to the buffer.
    pub fn ingest(&mut self, batch: Vec<LiveEvent>, events_per_second: f64) {
        for event in &batch {
            self.stats.record(event.event_type);
        }
        self.stats.set_rate(events_per_second);

        let dropped = self.buffer.prepend(batch);
        if dropped > 0 {
            log::debug!("Buffer full, dropped {} oldest event(s)", dropped);
        }
    }

    /// Load events into the buffer without counting them as streamed
    pub fn preload(&mut self, batch: Vec<LiveEvent>) {
        self.buffer.prepend(batch);
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut FilterState {
        &mut self.filter
    }

    pub fn set_filter(&mut self, filter: FilterState) {
        self.filter = filter;
    }

    /// Events passing the current filter, newest first
    pub fn visible(&self) -> Vec<&LiveEvent> {
        self.filter.apply(&self.buffer)
    }
}
