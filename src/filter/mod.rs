//! Filter and search over buffered events
//!
//! The visible list is a pure function of the buffer and a [`FilterState`].
//! All active dimensions are combined with AND and buffer order is kept.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{EventType, LiveEvent, Severity};

/// Sentinel accepted wherever an agent name is parsed
pub const ALL_AGENTS: &str = "all";

/// Agent selection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AgentFilter {
    #[default]
    All,
    /// Exact, case-sensitive agent name
    Named(String),
}

impl AgentFilter {
    pub fn matches(&self, agent: &str) -> bool {
        match self {
            AgentFilter::All => true,
            AgentFilter::Named(name) => name == agent,
        }
    }
}

impl FromStr for AgentFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == ALL_AGENTS {
            Ok(AgentFilter::All)
        } else {
            Ok(AgentFilter::Named(s.to_string()))
        }
    }
}

impl fmt::Display for AgentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentFilter::All => f.write_str(ALL_AGENTS),
            AgentFilter::Named(name) => f.write_str(name),
        }
    }
}

impl Serialize for AgentFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AgentFilter {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().unwrap_or_default())
    }
}

/// Current filter selections
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    pub types: HashSet<EventType>,
    pub severities: HashSet<Severity>,
    pub agent: AgentFilter,
    pub query: String,
}

impl Default for FilterState {
    /// Everything selected, like a checkbox group starting fully checked
    fn default() -> Self {
        FilterState {
            types: EventType::ALL.into_iter().collect(),
            severities: Severity::ALL.into_iter().collect(),
            agent: AgentFilter::All,
            query: String::new(),
        }
    }
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_types<I: IntoIterator<Item = EventType>>(mut self, types: I) -> Self {
        self.types = types.into_iter().collect();
        self
    }

    pub fn with_severities<I: IntoIterator<Item = Severity>>(mut self, severities: I) -> Self {
        self.severities = severities.into_iter().collect();
        self
    }

    pub fn only_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = AgentFilter::Named(agent.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Flip one type checkbox
    pub fn toggle_type(&mut self, event_type: EventType) {
        if !self.types.remove(&event_type) {
            self.types.insert(event_type);
        }
    }

    /// Flip one severity checkbox
    pub fn toggle_severity(&mut self, severity: Severity) {
        if !self.severities.remove(&severity) {
            self.severities.insert(severity);
        }
    }

    pub fn matches(&self, event: &LiveEvent) -> bool {
        self.types.contains(&event.event_type)
            && self.severities.contains(&event.severity)
            && self.agent.matches(&event.agent)
            && self.matches_query(event)
    }

    fn matches_query(&self, event: &LiveEvent) -> bool {
        if self.query.is_empty() {
            return true;
        }
        let needle = self.query.to_lowercase();
        event.message.to_lowercase().contains(&needle)
            || event.source.to_lowercase().contains(&needle)
            || event.agent.to_lowercase().contains(&needle)
    }

    /// Visible subset of `events`, in the order given
    pub fn apply<'a, I>(&self, events: I) -> Vec<&'a LiveEvent>
    where
        I: IntoIterator<Item = &'a LiveEvent>,
    {
        events.into_iter().filter(|e| self.matches(e)).collect()
    }
}

/// Distinct agent names in first-seen order, for populating an agent selector
pub fn agents<'a, I>(events: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a LiveEvent>,
{
    let mut seen = HashSet::new();
    events
        .into_iter()
        .map(|e| e.agent.as_str())
        .filter(|agent| seen.insert(*agent))
        .collect()
}
