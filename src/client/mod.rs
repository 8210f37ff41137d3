//! Boundary to the Aegis backend
//!
//! The streaming controller only talks to the backend through the
//! [`LiveBackend`] trait, so tests can substitute an in-process fake for
//! the HTTP implementation.

pub mod credentials;
pub mod http;

pub use credentials::{CredentialError, CredentialStore, MemoryCredentials, TokenFile};
pub use http::HttpBackend;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while talking to the backend
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Backend response did not contain a session id")]
    MissingSessionId,

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Whether the error means the stored credentials are no longer valid
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }
}

/// One batch of raw events as returned by the backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    pub events: Vec<Value>,
    pub events_per_second: Option<f64>,
}

impl RawBatch {
    pub fn new(events: Vec<Value>) -> Self {
        RawBatch {
            events,
            events_per_second: None,
        }
    }

    pub fn with_rate(mut self, events_per_second: f64) -> Self {
        self.events_per_second = Some(events_per_second);
        self
    }

    /// Decode a batch response body
    ///
    /// Accepts a bare array, or an object carrying the array under `events`
    /// or `data` with an optional `events_per_second` / `eventsPerSecond`.
    /// Anything else is an empty batch.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(events) => RawBatch::new(events),
            Value::Object(mut obj) => {
                let events = ["events", "data"]
                    .iter()
                    .find_map(|key| match obj.remove(*key) {
                        Some(Value::Array(events)) => Some(events),
                        _ => None,
                    })
                    .unwrap_or_default();
                let events_per_second = ["events_per_second", "eventsPerSecond"]
                    .iter()
                    .find_map(|key| obj.get(*key).and_then(Value::as_f64));
                RawBatch {
                    events,
                    events_per_second,
                }
            }
            _ => RawBatch::default(),
        }
    }
}

/// Operations the live pipeline needs from the backend
#[async_trait]
pub trait LiveBackend: Send + Sync {
    /// Begin a recording session and return its identifier
    async fn start_recording(&self) -> Result<String, ClientError>;

    /// Fetch at most `limit` new events for a session
    async fn fetch_live_batch(&self, session_id: &str, limit: usize)
        -> Result<RawBatch, ClientError>;

    /// End a recording session
    async fn stop_recording(&self, session_id: &str) -> Result<(), ClientError>;

    /// Fetch the most recent system events for the initial page load
    async fn fetch_recent_events(&self, limit: usize) -> Result<Vec<Value>, ClientError>;
}
