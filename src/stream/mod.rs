pub mod buffer;
pub mod controller;
pub mod store;
pub mod synthetic;

pub use buffer::EventBuffer;
pub use controller::{
    LoadOutcome, RunOutcome, StartOutcome, StopHandle, StreamController, StreamState, TickOutcome,
};
pub use store::LiveStore;
pub use synthetic::{EventGenerator, RandomEventGenerator};
