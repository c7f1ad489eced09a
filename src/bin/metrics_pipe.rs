//! Metrics Pipe
//!
//! Reads metric commands from stdin, aggregates them, and writes
//! `MONITORING|...` lines to stdout every flush interval. Whatever is still
//! buffered when stdin closes is flushed on exit.
//!
//! Usage:
//!   some-producer | metrics-pipe [config.toml]
//!
//! Commands (one per line):
//!   count <name> [<value> [<tags>]]
//!   gauge <name> <value> [<tags>]
//!   histogram <name> <value> [<tags>]
//!   set <name> <member> [<tags>]
//!   flush
//!
//! Example:
//!   count http.requests 1 env:prod,host:web01
//!   gauge system.cpu 75.5 host:web01

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use lambda_dd_metrics::metrics::{Aggregator, CommandOutcome, Emitter, MetricsCommand};
use lambda_dd_metrics::observability::{self, MetricsConfig};

const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => MetricsConfig::load(path)?,
        None => MetricsConfig::from_env()?,
    };
    observability::init_from_config(&config);

    info!(
        prefix = %config.service_prefix,
        group = ?config.stats_group,
        interval = ?config.flush_interval,
        "metrics-pipe started"
    );

    let aggregator = Arc::new(Aggregator::from_config(&config));
    let result = run(Arc::clone(&aggregator), &config).await;

    // Last handle: dropping it drains anything still buffered
    drop(aggregator);
    result?;
    Ok(())
}

async fn run(aggregator: Arc<Aggregator>, config: &MetricsConfig) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut ticker = interval(config.flush_interval.max(MIN_FLUSH_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if handle_line(aggregator.as_ref(), &line) {
                            flush(&aggregator, "requested").await;
                        }
                    }
                    None => {
                        debug!("stdin closed");
                        break;
                    }
                }
            }
            _ = ticker.tick() => flush(&aggregator, "periodic").await,
        }
    }

    Ok(())
}

/// Parse and record one input line; bad lines are logged and skipped.
///
/// Returns `true` for a `flush` command, which the caller runs on the
/// blocking pool instead of executing it here.
fn handle_line<E: Emitter>(aggregator: &Aggregator<E>, line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return false;
    }

    let cmd = match MetricsCommand::parse(line) {
        Ok(MetricsCommand::Flush) => return true,
        Ok(cmd) => cmd,
        Err(e) => {
            warn!(error = %e, line, "Skipping malformed command");
            return false;
        }
    };

    match cmd.execute(aggregator) {
        Ok(CommandOutcome::Recorded) => {}
        Ok(CommandOutcome::Flushed(n)) => debug!(lines = n, "Flushed on request"),
        Err(e) => warn!(error = %e, line, "Command failed"),
    }
    false
}

/// Flush on the blocking pool; stdout writes are synchronous
async fn flush(aggregator: &Arc<Aggregator>, reason: &'static str) {
    let aggregator = Arc::clone(aggregator);
    match tokio::task::spawn_blocking(move || aggregator.flush_all()).await {
        Ok(Ok(n)) => debug!(lines = n, reason, "Flush complete"),
        Ok(Err(e)) => error!(error = %e, reason, "Flush failed"),
        Err(e) => error!(error = %e, "Flush task panicked"),
    }
}
