//! Metrics Configuration
//!
//! Settings come from a TOML file, environment variables, or both (the
//! environment wins):
//!
//! - `METRICS_SERVICE_PREFIX`: prefix joined to every metric name
//! - `METRICS_STATS_GROUP`: adds a `group:<value>` tag to every metric
//! - `METRICS_FLUSH_INTERVAL_SECS`: how often `metrics-pipe` flushes
//! - `RUST_LOG`: operational log filter
//! - `METRICS_LOG_FORMAT`: `text` or `json`

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for aggregators, clients and the pipe binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prefix for every metric name (default: app)
    pub service_prefix: String,
    /// Stats group injected as a default tag (default: none)
    pub stats_group: Option<String>,
    /// Interval between periodic flushes (default: 10s)
    #[serde(rename = "flush_interval_secs", with = "duration_secs")]
    pub flush_interval: Duration,
    /// `tracing` filter directive for the operational log (default: info)
    pub log_filter: String,
    /// Operational log format (default: text)
    pub log_format: LogFormat,
}

/// Output format of the operational log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("Unknown log format: {}", other)),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            service_prefix: "app".to_string(),
            stats_group: None,
            flush_interval: Duration::from_secs(10),
            log_filter: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

/// Configuration loading failure
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    InvalidValue { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "Invalid value for {}: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl MetricsConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)?.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (normally the process environment)
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(prefix) = lookup("METRICS_SERVICE_PREFIX") {
            self.service_prefix = prefix;
        }
        if let Some(group) = lookup("METRICS_STATS_GROUP") {
            self.stats_group = Some(group).filter(|g| !g.is_empty());
        }
        if let Some(raw) = lookup("METRICS_FLUSH_INTERVAL_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: "METRICS_FLUSH_INTERVAL_SECS",
                value: raw.clone(),
            })?;
            self.flush_interval = Duration::from_secs(secs);
        }
        if let Some(filter) = lookup("RUST_LOG") {
            self.log_filter = filter;
        }
        if let Some(raw) = lookup("METRICS_LOG_FORMAT") {
            self.log_format = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "METRICS_LOG_FORMAT",
                value: raw.clone(),
            })?;
        }
        Ok(self)
    }
}

/// Serde helper for Duration as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
