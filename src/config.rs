use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::filter::{AgentFilter, FilterState};
use crate::models::{EventType, Severity};

/// Configuration for the live stream client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Backend connection configuration
    #[serde(default)]
    pub backend: BackendConfig,
    /// Credential storage configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Streaming configuration
    #[serde(default)]
    pub stream: StreamConfig,
    /// Initial filter selections
    #[serde(default)]
    pub filter: FilterConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Backend connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the Aegis backend API
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Credential storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// File holding the bearer token
    pub token_file: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            token_file: PathBuf::from(".aegis_token"),
        }
    }
}

/// Streaming configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Poll period while a recording session is open
    pub poll_interval_ms: u64,
    /// Maximum events fetched per tick
    pub fetch_limit: usize,
    /// Maximum events kept in the buffer
    pub buffer_capacity: usize,
    /// Lower bound of the degraded-mode tick delay
    pub degraded_min_interval_ms: u64,
    /// Upper bound of the degraded-mode tick delay
    pub degraded_max_interval_ms: u64,
    /// Events requested by the initial recent-events load (0 disables it)
    pub recent_limit: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            poll_interval_ms: 3000,
            fetch_limit: 20,
            buffer_capacity: 1000,
            degraded_min_interval_ms: 500,
            degraded_max_interval_ms: 2500,
            recent_limit: 50,
        }
    }
}

impl StreamConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn degraded_min_interval(&self) -> Duration {
        Duration::from_millis(self.degraded_min_interval_ms)
    }

    pub fn degraded_max_interval(&self) -> Duration {
        Duration::from_millis(self.degraded_max_interval_ms)
    }
}

/// Initial filter selections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub types: Vec<EventType>,
    pub severities: Vec<Severity>,
    /// Agent name, or "all"
    pub agent: AgentFilter,
    pub query: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            types: EventType::ALL.to_vec(),
            severities: Severity::ALL.to_vec(),
            agent: AgentFilter::All,
            query: String::new(),
        }
    }
}

impl FilterConfig {
    pub fn to_filter_state(&self) -> FilterState {
        FilterState {
            types: self.types.iter().copied().collect(),
            severities: self.severities.iter().copied().collect(),
            agent: self.agent.clone(),
            query: self.query.clone(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format: "json", "jsonl", or "console"
    pub format: String,
    /// Output file path (stdout when unset or format is "console")
    pub file_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            format: "console".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject settings the stream cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.backend.base_url.trim().is_empty() {
            return Err("backend.base_url must not be empty".to_string());
        }
        if self.stream.poll_interval_ms == 0 {
            return Err("stream.poll_interval_ms must be greater than zero".to_string());
        }
        if self.stream.fetch_limit == 0 {
            return Err("stream.fetch_limit must be greater than zero".to_string());
        }
        if self.stream.buffer_capacity == 0 {
            return Err("stream.buffer_capacity must be greater than zero".to_string());
        }
        if self.stream.degraded_max_interval_ms == 0 {
            return Err("stream.degraded_max_interval_ms must be greater than zero".to_string());
        }
        if self.stream.degraded_min_interval_ms > self.stream.degraded_max_interval_ms {
            return Err(format!(
                "stream.degraded_min_interval_ms ({}) exceeds stream.degraded_max_interval_ms ({})",
                self.stream.degraded_min_interval_ms, self.stream.degraded_max_interval_ms
            ));
        }
        Ok(())
    }
}
