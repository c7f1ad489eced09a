//! Immediate metric emission
//!
//! `MetricsClient` writes one line per call with no buffering. Use it when
//! per-observation lines are wanted (short-lived functions, one-off events);
//! use [`Aggregator`](super::Aggregator) to collapse repeated observations.

use super::emitter::{Emitter, LineEmitter};
use super::error::MetricsError;
use super::key::{full_name, KeyResolver};
use super::types::{MetricKind, Number};
use crate::observability::MetricsConfig;
use std::fmt::Display;
use std::time::{Duration, Instant};

/// Emits each observation as soon as it is made
pub struct MetricsClient<E: Emitter = LineEmitter> {
    service_prefix: String,
    resolver: KeyResolver,
    emitter: E,
}

impl MetricsClient {
    pub fn new(service_prefix: impl Into<String>, stats_group: Option<&str>) -> Self {
        Self::with_emitter(service_prefix, stats_group, LineEmitter::stdout())
    }

    pub fn from_config(config: &MetricsConfig) -> Self {
        Self::new(config.service_prefix.clone(), config.stats_group.as_deref())
    }
}

impl<E: Emitter> MetricsClient<E> {
    pub fn with_emitter(
        service_prefix: impl Into<String>,
        stats_group: Option<&str>,
        emitter: E,
    ) -> Self {
        MetricsClient {
            service_prefix: service_prefix.into(),
            resolver: KeyResolver::new(stats_group),
            emitter,
        }
    }

    /// Count one occurrence
    pub fn incr(&self, metric_name: &str, tags: &[&str]) -> Result<String, MetricsError> {
        self.increment(metric_name, 1, tags)
    }

    /// Count `count` occurrences
    pub fn increment(
        &self,
        metric_name: &str,
        count: impl Into<Number>,
        tags: &[&str],
    ) -> Result<String, MetricsError> {
        self.send(MetricKind::Count, metric_name, &count.into(), tags)
    }

    /// Report a point-in-time value
    pub fn gauge(
        &self,
        metric_name: &str,
        value: impl Into<Number>,
        tags: &[&str],
    ) -> Result<String, MetricsError> {
        self.send(MetricKind::Gauge, metric_name, &value.into(), tags)
    }

    /// Report one sample of a distribution
    pub fn histogram(
        &self,
        metric_name: &str,
        value: impl Into<Number>,
        tags: &[&str],
    ) -> Result<String, MetricsError> {
        self.send(MetricKind::Histogram, metric_name, &value.into(), tags)
    }

    /// Report a duration in seconds as a histogram sample
    pub fn timing(
        &self,
        metric_name: &str,
        delta: Duration,
        tags: &[&str],
    ) -> Result<String, MetricsError> {
        self.histogram(metric_name, Number::from_duration(delta)?, tags)
    }

    /// Run `f`, then report its duration as a histogram sample
    pub fn time<T>(
        &self,
        metric_name: &str,
        tags: &[&str],
        f: impl FnOnce() -> T,
    ) -> Result<T, MetricsError> {
        let tags = self.resolver.display_tags(tags)?;

        let start = Instant::now();
        let result = f();
        let sample = Number::from_duration(start.elapsed())?;

        let name = full_name(&self.service_prefix, metric_name);
        self.emitter
            .emit(MetricKind::Histogram, &name, &sample, &tags)?;
        Ok(result)
    }

    /// Report one member of a unique-value set
    pub fn set(
        &self,
        metric_name: &str,
        member: &str,
        tags: &[&str],
    ) -> Result<String, MetricsError> {
        self.send(MetricKind::Set, metric_name, &member, tags)
    }

    fn send(
        &self,
        kind: MetricKind,
        metric_name: &str,
        value: &dyn Display,
        tags: &[&str],
    ) -> Result<String, MetricsError> {
        let tags = self.resolver.display_tags(tags)?;
        let name = full_name(&self.service_prefix, metric_name);
        self.emitter.emit(kind, &name, value, &tags)
    }
}
