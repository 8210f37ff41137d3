pub mod event;
pub mod stats;

pub use event::{EventOrigin, EventType, LiveEvent, Severity};
pub use stats::StreamStats;
