use serde::{Deserialize, Serialize};

use super::event::EventType;

/// Rolling statistics for the live stream
///
/// Counters only ever grow; `events_per_second` is replaced by every batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStats {
    pub total_events: u64,
    pub events_per_second: f64,
    pub network_events: u64,
    pub file_events: u64,
    pub process_events: u64,
    pub memory_events: u64,
    pub registry_events: u64,
    pub event_events: u64,
}

impl StreamStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one ingested event
    pub fn record(&mut self, event_type: EventType) {
        self.total_events += 1;
        let counter = match event_type {
            EventType::Network => &mut self.network_events,
            EventType::File => &mut self.file_events,
            EventType::Process => &mut self.process_events,
            EventType::Memory => &mut self.memory_events,
            EventType::Registry => &mut self.registry_events,
            EventType::Event => &mut self.event_events,
        };
        *counter += 1;
    }

    pub fn count(&self, event_type: EventType) -> u64 {
        match event_type {
            EventType::Network => self.network_events,
            EventType::File => self.file_events,
            EventType::Process => self.process_events,
            EventType::Memory => self.memory_events,
            EventType::Registry => self.registry_events,
            EventType::Event => self.event_events,
        }
    }

    pub fn set_rate(&mut self, events_per_second: f64) {
        self.events_per_second = events_per_second;
    }
}
