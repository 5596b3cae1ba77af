//! Metrics aggregation: per-kind accumulators plus the streaming collector.

pub mod collector;
pub mod stats;

pub use collector::{Collector, CollectorReport, MetricsView, ResultSink, AGGREGATED};
pub use stats::{percentile, OpMetrics, Stats};
