//! Stdout Metrics Aggregation Module
//!
//! Buffers counters, gauges, histogram samples and set members in memory,
//! keyed by metric name plus an order-independent tag set, and drains them
//! as `MONITORING|...` lines for a log-scraping monitoring agent:
//!
//! - **Aggregator** merges observations per bucket and emits on flush
//! - **MetricsClient** emits every observation immediately
//! - **Emitter** renders and writes one line; stdout by default

mod aggregator;
mod client;
mod clock;
mod commands;
mod emitter;
mod error;
mod key;
mod types;

pub use aggregator::{Aggregator, Flush, PendingCounts};
pub use client::MetricsClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::{CommandError, CommandOutcome, CommandValue, MetricsCommand};
pub use emitter::{format_line, Emitter, LineEmitter, LINE_PREFIX};
pub use error::{ArithmeticError, InvalidTagsError, MetricsError};
pub use key::{full_name, KeyResolver, ResolvedKey};
pub use types::{MetricKind, Number, TagSet};
