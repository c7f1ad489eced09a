pub mod metrics;
pub mod observability;

pub use metrics::{
    Aggregator, Emitter, LineEmitter, MetricKind, MetricsClient, MetricsError, Number,
};
pub use observability::MetricsConfig;
