//! Operational log setup
//!
//! The operational log goes to stderr. Stdout is reserved for metric lines
//! so the monitoring agent never has to skip anything it scrapes.

use super::config::{LogFormat, MetricsConfig};
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// An unparsable filter falls back to `info`. Calling this twice is
/// harmless; the first subscriber stays installed.
pub fn init_logging(filter: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|e| {
        eprintln!("Invalid log filter {:?} ({}), using info", filter, e);
        EnvFilter::new("info")
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Install the subscriber described by `config`
pub fn init_from_config(config: &MetricsConfig) {
    init_logging(&config.log_filter, config.log_format);
}
