//! In-memory metric aggregation
//!
//! Observations are merged into buckets keyed by metric name and tag set,
//! then emitted one line per bucket by an explicit flush:
//!
//! - **Count**: summed (`Number::checked_add`)
//! - **Gauge**: last write wins
//! - **Histogram**: every sample kept, one line per sample on flush
//! - **Set**: distinct members kept, one line per member on flush
//!
//! All state sits behind one mutex. A flush swaps the whole state for an
//! empty one inside a single critical section and emits from the detached
//! snapshot with the lock released, so a concurrent recording lands either
//! in the snapshot or in the fresh state, never in neither.

use super::emitter::{Emitter, LineEmitter};
use super::error::MetricsError;
use super::key::{full_name, KeyResolver, ResolvedKey};
use super::types::{MetricKind, Number, TagSet};
use crate::observability::MetricsConfig;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// metric name -> tag set -> value
type Buckets<V> = BTreeMap<String, BTreeMap<TagSet, V>>;

#[derive(Debug, Default)]
struct AggregatorState {
    counts: Buckets<Number>,
    gauges: Buckets<Number>,
    histograms: Buckets<Vec<Number>>,
    sets: Buckets<BTreeSet<String>>,
    /// Tag order to reproduce when emitting, latest registration wins
    display: Buckets<Vec<String>>,
}

impl AggregatorState {
    /// Remember the caller's tag order and hand back the bucket key
    fn register(&mut self, name: &str, key: ResolvedKey) -> TagSet {
        self.display
            .entry(name.to_string())
            .or_default()
            .insert(key.tag_set.clone(), key.display);
        key.tag_set
    }

    fn display_tags(&self, name: &str, tag_set: &TagSet) -> Vec<String> {
        self.display
            .get(name)
            .and_then(|by_tags| by_tags.get(tag_set))
            .cloned()
            .unwrap_or_default()
    }

    fn pending(&self) -> PendingCounts {
        fn buckets<V>(b: &Buckets<V>) -> usize {
            b.values().map(BTreeMap::len).sum()
        }

        PendingCounts {
            count: buckets(&self.counts),
            gauge: buckets(&self.gauges),
            histogram: buckets(&self.histograms),
            set: buckets(&self.sets),
        }
    }

    /// Flatten a detached snapshot into lines, in flush order
    fn into_lines(mut self) -> Vec<PendingLine> {
        let mut lines = Vec::new();

        for kind in MetricKind::FLUSH_ORDER {
            match kind {
                MetricKind::Count => {
                    for (name, by_tags) in std::mem::take(&mut self.counts) {
                        for (tag_set, total) in by_tags {
                            let tags = self.display_tags(&name, &tag_set);
                            let value = LineValue::Number(total);
                            lines.push(PendingLine::new(kind, &name, tags, value));
                        }
                    }
                }
                MetricKind::Gauge => {
                    for (name, by_tags) in std::mem::take(&mut self.gauges) {
                        for (tag_set, value) in by_tags {
                            let tags = self.display_tags(&name, &tag_set);
                            let value = LineValue::Number(value);
                            lines.push(PendingLine::new(kind, &name, tags, value));
                        }
                    }
                }
                MetricKind::Set => {
                    for (name, by_tags) in std::mem::take(&mut self.sets) {
                        for (tag_set, members) in by_tags {
                            let tags = self.display_tags(&name, &tag_set);
                            for member in members {
                                let value = LineValue::Member(member);
                                lines.push(PendingLine::new(kind, &name, tags.clone(), value));
                            }
                        }
                    }
                }
                MetricKind::Histogram => {
                    for (name, by_tags) in std::mem::take(&mut self.histograms) {
                        for (tag_set, samples) in by_tags {
                            let tags = self.display_tags(&name, &tag_set);
                            for sample in samples {
                                let value = LineValue::Number(sample);
                                lines.push(PendingLine::new(kind, &name, tags.clone(), value));
                            }
                        }
                    }
                }
            }
        }

        lines
    }
}

fn bucket<'a, V: Default>(buckets: &'a mut Buckets<V>, name: &str, tag_set: TagSet) -> &'a mut V {
    buckets
        .entry(name.to_string())
        .or_default()
        .entry(tag_set)
        .or_default()
}

/// Live bucket counts per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    pub count: usize,
    pub gauge: usize,
    pub histogram: usize,
    pub set: usize,
}

impl PendingCounts {
    pub fn total(&self) -> usize {
        self.count + self.gauge + self.histogram + self.set
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[derive(Debug)]
enum LineValue {
    Number(Number),
    Member(String),
}

impl std::fmt::Display for LineValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineValue::Number(n) => write!(f, "{}", n),
            LineValue::Member(m) => f.write_str(m),
        }
    }
}

#[derive(Debug)]
struct PendingLine {
    kind: MetricKind,
    name: String,
    tags: Vec<String>,
    value: LineValue,
}

impl PendingLine {
    fn new(kind: MetricKind, name: &str, tags: Vec<String>, value: LineValue) -> Self {
        PendingLine {
            kind,
            name: name.to_string(),
            tags,
            value,
        }
    }
}

/// Buffers metric observations and emits them on flush
pub struct Aggregator<E: Emitter = LineEmitter> {
    service_prefix: String,
    resolver: KeyResolver,
    state: Mutex<AggregatorState>,
    emitter: E,
}

impl Aggregator {
    /// Aggregator emitting to stdout
    pub fn new(service_prefix: impl Into<String>, stats_group: Option<&str>) -> Self {
        Self::with_emitter(service_prefix, stats_group, LineEmitter::stdout())
    }

    pub fn from_config(config: &MetricsConfig) -> Self {
        Self::new(config.service_prefix.clone(), config.stats_group.as_deref())
    }
}

impl<E: Emitter> Aggregator<E> {
    pub fn with_emitter(
        service_prefix: impl Into<String>,
        stats_group: Option<&str>,
        emitter: E,
    ) -> Self {
        Aggregator {
            service_prefix: service_prefix.into(),
            resolver: KeyResolver::new(stats_group),
            state: Mutex::new(AggregatorState::default()),
            emitter,
        }
    }

    pub fn service_prefix(&self) -> &str {
        &self.service_prefix
    }

    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    /// Add `count` to the counter bucket
    pub fn increment(
        &self,
        metric_name: &str,
        count: impl Into<Number>,
        tags: &[&str],
    ) -> Result<(), MetricsError> {
        let key = self.resolver.resolve(tags)?;
        let count = count.into();

        let mut state = self.state.lock();
        let current = state
            .counts
            .get(metric_name)
            .and_then(|by_tags| by_tags.get(&key.tag_set))
            .copied()
            .unwrap_or_default();
        // Computed before touching state so a failed merge leaves nothing behind
        let total = current.checked_add(count)?;

        let tag_set = state.register(metric_name, key);
        *bucket(&mut state.counts, metric_name, tag_set) = total;
        Ok(())
    }

    /// Increment by one
    pub fn incr(&self, metric_name: &str, tags: &[&str]) -> Result<(), MetricsError> {
        self.increment(metric_name, 1, tags)
    }

    /// Overwrite the gauge bucket
    pub fn set_gauge(
        &self,
        metric_name: &str,
        value: impl Into<Number>,
        tags: &[&str],
    ) -> Result<(), MetricsError> {
        let key = self.resolver.resolve(tags)?;
        let value = value.into();

        let mut state = self.state.lock();
        let tag_set = state.register(metric_name, key);
        *bucket(&mut state.gauges, metric_name, tag_set) = value;
        Ok(())
    }

    /// Append a sample to the histogram bucket
    pub fn record_histogram(
        &self,
        metric_name: &str,
        value: impl Into<Number>,
        tags: &[&str],
    ) -> Result<(), MetricsError> {
        let key = self.resolver.resolve(tags)?;
        self.push_sample(metric_name, key, value.into());
        Ok(())
    }

    /// Record a duration, in seconds, as a histogram sample
    pub fn timing(
        &self,
        metric_name: &str,
        delta: Duration,
        tags: &[&str],
    ) -> Result<(), MetricsError> {
        let sample = Number::from_duration(delta)?;
        self.record_histogram(metric_name, sample, tags)
    }

    /// Run `f` and record how long it took as a histogram sample.
    ///
    /// Tags are checked before `f` runs, so an invalid tag never discards
    /// the closure's result.
    pub fn time<T>(
        &self,
        metric_name: &str,
        tags: &[&str],
        f: impl FnOnce() -> T,
    ) -> Result<T, MetricsError> {
        let key = self.resolver.resolve(tags)?;

        let start = Instant::now();
        let result = f();
        let sample = Number::from_duration(start.elapsed())?;

        self.push_sample(metric_name, key, sample);
        Ok(result)
    }

    /// Add a member to the set bucket
    pub fn record_set_member(
        &self,
        metric_name: &str,
        member: impl Into<String>,
        tags: &[&str],
    ) -> Result<(), MetricsError> {
        let key = self.resolver.resolve(tags)?;
        let member = member.into();

        let mut state = self.state.lock();
        let tag_set = state.register(metric_name, key);
        bucket(&mut state.sets, metric_name, tag_set).insert(member);
        Ok(())
    }

    fn push_sample(&self, metric_name: &str, key: ResolvedKey, sample: Number) {
        let mut state = self.state.lock();
        let tag_set = state.register(metric_name, key);
        bucket(&mut state.histograms, metric_name, tag_set).push(sample);
    }

    /// Buckets waiting for the next flush
    pub fn pending(&self) -> PendingCounts {
        self.state.lock().pending()
    }

    /// Detach every bucket and return the lines to emit, lazily.
    ///
    /// The state is emptied before this returns; lines are written as the
    /// iterator is advanced. Dropping the iterator early still emits the
    /// rest of the snapshot.
    pub fn flush(&self) -> Flush<'_, E> {
        let snapshot = std::mem::take(&mut *self.state.lock());
        let lines = snapshot.into_lines();
        debug!(lines = lines.len(), prefix = %self.service_prefix, "Flushing metrics");

        Flush {
            aggregator: self,
            lines: lines.into_iter(),
            current: None,
            emitted: 0,
        }
    }

    /// Flush to completion, returning the number of lines emitted
    pub fn flush_all(&self) -> Result<usize, MetricsError> {
        let mut flush = self.flush();
        for line in flush.by_ref() {
            line?;
        }
        Ok(flush.emitted())
    }
}

impl<E: Emitter> Drop for Aggregator<E> {
    fn drop(&mut self) {
        let mut remaining = 0usize;
        for result in self.flush() {
            match result {
                Ok(_) => remaining += 1,
                Err(e) => warn!(error = %e, "Failed to emit metric during final flush"),
            }
        }

        if remaining > 0 {
            info!(
                "Sent {} {} total remaining metric(s).",
                remaining, self.service_prefix
            );
        }
    }
}

impl<E: Emitter> std::fmt::Debug for Aggregator<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("service_prefix", &self.service_prefix)
            .field("resolver", &self.resolver)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

/// One-shot sequence of emitted lines produced by [`Aggregator::flush`]
pub struct Flush<'a, E: Emitter> {
    aggregator: &'a Aggregator<E>,
    lines: std::vec::IntoIter<PendingLine>,
    /// Kind being emitted and how many of its lines went out
    current: Option<(MetricKind, usize)>,
    emitted: usize,
}

impl<E: Emitter> Flush<'_, E> {
    /// Lines successfully emitted so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Lines not yet emitted
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }

    fn begin(&mut self, kind: MetricKind) {
        if !matches!(self.current, Some((current, _)) if current == kind) {
            self.report();
            self.current = Some((kind, 0));
        }
    }

    fn report(&mut self) {
        if let Some((kind, sent)) = self.current.take() {
            if sent > 0 {
                info!(
                    "Sent {} {} {} metric(s).",
                    sent, self.aggregator.service_prefix, kind
                );
            }
        }
    }
}

impl<E: Emitter> Iterator for Flush<'_, E> {
    type Item = Result<String, MetricsError>;

    fn next(&mut self) -> Option<Self::Item> {
        let Some(line) = self.lines.next() else {
            self.report();
            return None;
        };

        self.begin(line.kind);
        let name = full_name(&self.aggregator.service_prefix, &line.name);
        let result = self
            .aggregator
            .emitter
            .emit(line.kind, &name, &line.value, &line.tags);

        if result.is_ok() {
            self.emitted += 1;
            if let Some((_, sent)) = self.current.as_mut() {
                *sent += 1;
            }
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.lines.size_hint()
    }
}

impl<E: Emitter> Drop for Flush<'_, E> {
    fn drop(&mut self) {
        for result in self.by_ref() {
            if let Err(e) = result {
                warn!(error = %e, "Failed to emit metric while finishing flush");
            }
        }
    }
}
