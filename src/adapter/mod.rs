//! Event source adapter
//!
//! Converts raw event objects of arbitrary shape, as returned by the live
//! polling endpoint, the recent-events endpoint, or the synthetic generator,
//! into canonical [`LiveEvent`] records. Normalization never fails: every
//! missing, null, empty or mistyped field falls back to its default.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::{EventOrigin, EventType, LiveEvent, Severity};

const ID_KEYS: &[&str] = &["id", "event_id"];
const TIMESTAMP_KEYS: &[&str] = &["timestamp", "time", "created_at"];
const SOURCE_KEYS: &[&str] = &["source", "sensor"];
const TYPE_KEYS: &[&str] = &["type", "event_type", "category"];
const SEVERITY_KEYS: &[&str] = &["severity", "level"];
const MESSAGE_KEYS: &[&str] = &["message", "description"];
const AGENT_KEYS: &[&str] = &["agent", "agent_name"];

pub const DEFAULT_SOURCE: &str = "Unknown";

/// Classify a free-text type string
///
/// Substring checks run in a fixed priority order and the first hit wins,
/// so "network-file-hybrid" is `Network`.
pub fn classify_type(text: &str) -> EventType {
    let lower = text.to_lowercase();
    if lower.contains("network") {
        EventType::Network
    } else if lower.contains("file") {
        EventType::File
    } else if lower.contains("process") {
        EventType::Process
    } else if lower.contains("memory") {
        EventType::Memory
    } else if lower.contains("registry") {
        EventType::Registry
    } else {
        EventType::Event
    }
}

/// Classify a free-text severity or log level string
///
/// First match wins: "low-critical" is `Critical`.
pub fn classify_severity(text: &str) -> Severity {
    let lower = text.to_lowercase();
    if lower.contains("critical") || lower.contains("error") {
        Severity::Critical
    } else if lower.contains("high") || lower.contains("warn") {
        Severity::High
    } else if lower.contains("low") || lower.contains("debug") {
        Severity::Low
    } else {
        Severity::Medium
    }
}

/// Normalize one raw event into a canonical record
pub fn normalize(raw: &Value, origin: EventOrigin) -> LiveEvent {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);

    let id = first_id(obj).unwrap_or_else(generate_id);
    let timestamp = first_timestamp(obj).unwrap_or_else(Utc::now);
    let source = first_string(obj, SOURCE_KEYS).unwrap_or_else(|| DEFAULT_SOURCE.to_string());
    let event_type = first_string(obj, TYPE_KEYS)
        .map(|t| classify_type(&t))
        .unwrap_or(EventType::Event);
    let severity = first_string(obj, SEVERITY_KEYS)
        .map(|s| classify_severity(&s))
        .unwrap_or(Severity::Medium);
    let message =
        first_string(obj, MESSAGE_KEYS).unwrap_or_else(|| origin.default_message().to_string());
    let agent =
        first_string(obj, AGENT_KEYS).unwrap_or_else(|| origin.default_agent().to_string());
    let details = obj
        .get("details")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    LiveEvent {
        id,
        timestamp,
        source,
        event_type,
        severity,
        message,
        details,
        agent,
    }
}

/// Normalize a batch, preserving its order
pub fn normalize_batch(raws: &[Value], origin: EventOrigin) -> Vec<LiveEvent> {
    raws.iter().map(|raw| normalize(raw, origin)).collect()
}

/// Generate an event identifier for records that arrive without one
pub fn generate_id() -> String {
    format!("evt-{}", Uuid::new_v4())
}

fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

fn first_id(obj: &Map<String, Value>) -> Option<String> {
    ID_KEYS
        .iter()
        .filter_map(|key| obj.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn first_timestamp(obj: &Map<String, Value>) -> Option<DateTime<Utc>> {
    TIMESTAMP_KEYS
        .iter()
        .filter_map(|key| obj.get(*key))
        .find_map(parse_timestamp)
}

/// Accepts RFC 3339 strings, naive ISO-8601 strings (taken as UTC), and
/// epoch numbers in seconds or milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|naive| naive.and_utc())
                })
        }
        Value::Number(n) => {
            let raw = n.as_i64()?;
            // Anything past year ~33658 in seconds is really milliseconds
            if raw.abs() >= 1_000_000_000_000 {
                DateTime::from_timestamp_millis(raw)
            } else {
                DateTime::from_timestamp(raw, 0)
            }
        }
        _ => None,
    }
}
