pub mod adapter;
pub mod client;
pub mod config;
pub mod filter;
pub mod models;
pub mod output;
pub mod stream;

// Re-export commonly used types
pub use models::{EventOrigin, EventType, LiveEvent, Severity, StreamStats};
pub use adapter::{classify_severity, classify_type, normalize, normalize_batch};
pub use filter::{AgentFilter, FilterState};
pub use client::{ClientError, CredentialStore, HttpBackend, LiveBackend, RawBatch, TokenFile};
pub use stream::{EventBuffer, LiveStore, StreamController, StreamState};
