//! Metric line emission
//!
//! Line format (scraped from stdout by the monitoring agent):
//!
//! ```text
//! MONITORING|<unix_seconds>|<value>|<kind>|<metric_name>[|#<tag1>,<tag2>,...]
//! ```
//!
//! Emission is synchronous and unbuffered: every line is written and
//! flushed before `emit` returns.

use super::clock::{Clock, SystemClock};
use super::error::MetricsError;
use super::types::MetricKind;
use parking_lot::Mutex;
use std::fmt::Display;
use std::io::{Stdout, Write};
use std::sync::Arc;

/// Line prefix recognised by the monitoring agent
pub const LINE_PREFIX: &str = "MONITORING";

/// Terminal sink for metric lines
pub trait Emitter: Send + Sync {
    /// Render and write one line, returning it
    fn emit(
        &self,
        kind: MetricKind,
        full_name: &str,
        value: &dyn Display,
        tags: &[String],
    ) -> Result<String, MetricsError>;
}

impl<E: Emitter + ?Sized> Emitter for Arc<E> {
    fn emit(
        &self,
        kind: MetricKind,
        full_name: &str,
        value: &dyn Display,
        tags: &[String],
    ) -> Result<String, MetricsError> {
        (**self).emit(kind, full_name, value, tags)
    }
}

/// Build a metric line. Tags keep the order given.
pub fn format_line(
    timestamp: u64,
    value: &dyn Display,
    kind: MetricKind,
    full_name: &str,
    tags: &[String],
) -> String {
    let mut line = format!(
        "{}|{}|{}|{}|{}",
        LINE_PREFIX, timestamp, value, kind, full_name
    );
    if !tags.is_empty() {
        line.push_str("|#");
        line.push_str(&tags.join(","));
    }
    line
}

/// Writes lines to any `Write` sink, stamped by `C`
pub struct LineEmitter<W = Stdout, C = SystemClock> {
    writer: Mutex<W>,
    clock: C,
}

impl LineEmitter {
    /// Emitter for process stdout using wall-clock time
    pub fn stdout() -> Self {
        LineEmitter::new(std::io::stdout(), SystemClock)
    }
}

impl<W: Write, C: Clock> LineEmitter<W, C> {
    pub fn new(writer: W, clock: C) -> Self {
        LineEmitter {
            writer: Mutex::new(writer),
            clock,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Run `f` against the underlying writer
    pub fn with_writer<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        f(&mut self.writer.lock())
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send, C: Clock> Emitter for LineEmitter<W, C> {
    fn emit(
        &self,
        kind: MetricKind,
        full_name: &str,
        value: &dyn Display,
        tags: &[String],
    ) -> Result<String, MetricsError> {
        let line = format_line(self.clock.now_secs(), value, kind, full_name, tags);

        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line)?;
        writer.flush()?;

        Ok(line)
    }
}

impl<W, C> std::fmt::Debug for LineEmitter<W, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineEmitter").finish_non_exhaustive()
    }
}
