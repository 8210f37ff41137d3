//! Synthetic events for degraded mode
//!
//! When the backend cannot be reached the stream keeps moving with locally
//! generated events. Generators produce raw JSON so that synthetic events go
//! through the same adapter as real ones.

use std::time::Duration;

use chrono::Utc;
use rand::seq::IndexedRandom;
use rand::{rng, Rng};
use serde_json::{json, Value};

/// Seam for the nondeterministic parts of the stream
pub trait EventGenerator: Send + Sync {
    /// One raw event
    fn generate(&self) -> Value;

    /// Events-per-second figure used when a batch does not report one
    fn estimate_rate(&self) -> f64;

    /// Delay before the next degraded-mode tick, within `[min, max]`
    fn degraded_interval(&self, min: Duration, max: Duration) -> Duration;
}

struct Template {
    event_type: &'static str,
    severity: &'static str,
    source: &'static str,
    message: &'static str,
}

const TEMPLATES: &[Template] = &[
    Template {
        event_type: "network_connection",
        severity: "high",
        source: "Network Monitor",
        message: "Outbound connection to known C2 address",
    },
    Template {
        event_type: "network_dns",
        severity: "low",
        source: "DNS Sensor",
        message: "DNS query for newly registered domain",
    },
    Template {
        event_type: "file_created",
        severity: "medium",
        source: "File Integrity Monitor",
        message: "Executable dropped in temp directory",
    },
    Template {
        event_type: "file_modified",
        severity: "critical",
        source: "File Integrity Monitor",
        message: "Mass file rename consistent with ransomware",
    },
    Template {
        event_type: "process_start",
        severity: "high",
        source: "Process Monitor",
        message: "Encoded PowerShell command line observed",
    },
    Template {
        event_type: "process_injection",
        severity: "critical",
        source: "EDR Sensor",
        message: "Remote thread created in lsass.exe",
    },
    Template {
        event_type: "memory_scan",
        severity: "high",
        source: "Memory Analyzer",
        message: "RWX region with shellcode signature detected",
    },
    Template {
        event_type: "registry_set",
        severity: "medium",
        source: "Registry Monitor",
        message: "Run key persistence entry added",
    },
    Template {
        event_type: "user_logon",
        severity: "info",
        source: "Security Log",
        message: "Interactive logon for administrator",
    },
    Template {
        event_type: "ssh_auth",
        severity: "warning",
        source: "Auth Log",
        message: "ssh brute force detected",
    },
];

const AGENTS: &[&str] = &[
    "Live Response Agent",
    "WS-FIN-014",
    "SRV-DC-01",
    "LNX-WEB-03",
];

const HOSTS: &[&str] = &["10.0.4.17", "10.0.8.2", "172.16.3.40", "192.168.10.5"];

/// Picks random templates with randomized details
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomEventGenerator;

impl RandomEventGenerator {
    pub fn new() -> Self {
        RandomEventGenerator
    }
}

impl EventGenerator for RandomEventGenerator {
    fn generate(&self) -> Value {
        let mut rng = rng();
        let template = &TEMPLATES[rng.random_range(0..TEMPLATES.len())];
        let agent = AGENTS.choose(&mut rng).copied().unwrap_or("Live Response Agent");
        let host = HOSTS.choose(&mut rng).copied().unwrap_or("127.0.0.1");

        json!({
            "timestamp": Utc::now().to_rfc3339(),
            "source": template.source,
            "type": template.event_type,
            "severity": template.severity,
            "message": template.message,
            "agent": agent,
            "details": {
                "host": host,
                "pid": rng.random_range(100..65_535u32),
                "synthetic": true,
            },
        })
    }

    fn estimate_rate(&self) -> f64 {
        let rate: f64 = rng().random_range(5.0..50.0);
        (rate * 10.0).round() / 10.0
    }

    fn degraded_interval(&self, min: Duration, max: Duration) -> Duration {
        if max <= min {
            return min;
        }
        let millis = rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
        Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::normalize;
    use crate::models::EventOrigin;

    #[test]
    fn test_generated_events_normalize_cleanly() {
        let generator = RandomEventGenerator::new();
        for _ in 0..50 {
            let event = normalize(&generator.generate(), EventOrigin::LiveStream);
            assert_ne!(event.source, "Unknown");
            assert_eq!(event.details["synthetic"], true);
        }
    }

    #[test]
    fn test_templates_cover_every_type() {
        use crate::adapter::classify_type;
        use crate::models::EventType;
        use std::collections::HashSet;

        let covered: HashSet<EventType> = TEMPLATES.iter().map(|t| classify_type(t.event_type)).collect();
        assert_eq!(covered.len(), EventType::ALL.len());
    }

    #[test]
    fn test_rate_in_range() {
        let generator = RandomEventGenerator::new();
        for _ in 0..100 {
            let rate = generator.estimate_rate();
            assert!((5.0..=50.0).contains(&rate));
        }
    }

    #[test]
    fn test_degraded_interval_bounds() {
        let generator = RandomEventGenerator::new();
        let min = Duration::from_millis(500);
        let max = Duration::from_millis(2500);
        for _ in 0..100 {
            let delay = generator.degraded_interval(min, max);
            assert!(delay >= min && delay <= max);
        }
        assert_eq!(generator.degraded_interval(max, min), max);
    }
}
