use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Category of a canonical live event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Network,
    File,
    Process,
    Memory,
    Registry,
    Event,
}

impl EventType {
    /// Every event type, in classification priority order
    pub const ALL: [EventType; 6] = [
        EventType::Network,
        EventType::File,
        EventType::Process,
        EventType::Memory,
        EventType::Registry,
        EventType::Event,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Network => "network",
            EventType::File => "file",
            EventType::Process => "process",
            EventType::Memory => "memory",
            EventType::Registry => "registry",
            EventType::Event => "event",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    /// Strict parse of a canonical name (use `adapter::classify_type` for free text)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown event type: {}", s))
    }
}

/// Severity of a canonical live event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .iter()
            .copied()
            .find(|sev| sev.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown severity: {}", s))
    }
}

/// Where a raw event came from; selects the message and agent defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrigin {
    /// Polled from a recording session, or generated locally in degraded mode
    LiveStream,
    /// Initial page load of recent system events
    Recent,
}

impl EventOrigin {
    pub fn default_message(&self) -> &'static str {
        match self {
            EventOrigin::LiveStream => "Event detected",
            EventOrigin::Recent => "System event",
        }
    }

    pub fn default_agent(&self) -> &'static str {
        match self {
            EventOrigin::LiveStream => "Live Response Agent",
            EventOrigin::Recent => "System",
        }
    }
}

/// Canonical event record produced by the adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub severity: Severity,
    pub message: String,
    pub details: Map<String, Value>,
    pub agent: String,
}
