//! Configuration and operational logging

mod config;
mod logging;

pub use config::{ConfigError, LogFormat, MetricsConfig};
pub use logging::{init_from_config, init_logging};
