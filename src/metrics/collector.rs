//! Streaming result collection.
//!
//! Workers submit [`ResultRecord`]s through a bounded channel; a single
//! ingestion task dequeues them serially and updates the per-kind
//! accumulators. Funneling every mutation through one consumer is the
//! concurrency-safety anchor: producers never take the metrics lock, and a
//! snapshot racing an in-flight update observes either the pre- or
//! post-record state, never a torn one.
//!
//! `submit` never blocks a worker. Under sustained overload the channel
//! fills and records are dropped; every drop is counted and logged, so the
//! resulting undercount is explicit rather than silent.

use crate::core::{BenchError, OperationKind, Result, ResultRecord};
use crate::metrics::stats::{percentile, OpMetrics, Stats};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Method label for the cross-kind statistics row.
pub const AGGREGATED: &str = "AGGREGATED";

struct Shared {
    metrics: RwLock<HashMap<OperationKind, OpMetrics>>,
    sample_capacity: usize,
    dropped: AtomicU64,
}

impl Shared {
    fn apply(&self, record: &ResultRecord) {
        let mut metrics = self.metrics.write();
        metrics
            .entry(record.kind)
            .or_insert_with(|| OpMetrics::new(self.sample_capacity))
            .record(record.latency_ms, record.outcome.is_err());
    }
}

/// Clonable producer handle used by workers.
#[derive(Clone)]
pub struct ResultSink {
    tx: mpsc::Sender<ResultRecord>,
    shared: Arc<Shared>,
}

impl ResultSink {
    /// Enqueue a result without blocking.
    ///
    /// On a full queue the record is dropped, counted, and a warning is
    /// emitted.
    pub fn submit(&self, record: ResultRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {},
            Err(mpsc::error::TrySendError::Full(record)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(kind = %record.kind, "result queue full, dropping record");
            },
            Err(mpsc::error::TrySendError::Closed(record)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(kind = %record.kind, "collector stopped, dropping record");
            },
        }
    }
}

/// Read-only statistics view, shared with the progress reporter.
#[derive(Clone)]
pub struct MetricsView {
    shared: Arc<Shared>,
}

impl MetricsView {
    /// Snapshot one kind, if it has been observed.
    pub fn snapshot(&self, kind: OperationKind) -> Option<Stats> {
        let metrics = self.shared.metrics.read();
        metrics.get(&kind).map(|m| m.stats(kind.as_str()))
    }

    /// Snapshots for every observed kind, in reporting order.
    pub fn snapshots(&self) -> Vec<Stats> {
        let metrics = self.shared.metrics.read();
        OperationKind::ALL
            .iter()
            .filter_map(|kind| metrics.get(kind).map(|m| m.stats(kind.as_str())))
            .collect()
    }

    /// Cross-kind aggregate.
    ///
    /// Counters are summed from the exact accumulators; percentiles are
    /// computed over the union of the raw per-kind samples, merged before
    /// sorting. Combining raw samples (rather than weighting per-kind
    /// percentiles) is required for correctness across kinds with different
    /// volumes.
    pub fn aggregate(&self) -> Stats {
        let metrics = self.shared.metrics.read();

        let mut count = 0u64;
        let mut error_count = 0u64;
        let mut latency_sum = 0.0f64;
        let mut min_ms = f64::INFINITY;
        let mut max_ms = 0.0f64;
        let mut merged: Vec<f64> = Vec::new();

        for m in metrics.values() {
            count += m.count();
            error_count += m.error_count();
            latency_sum += m.latency_sum();
            if let Some(min) = m.latency_min() {
                min_ms = min_ms.min(min);
            }
            if let Some(max) = m.latency_max() {
                max_ms = max_ms.max(max);
            }
            merged.extend(m.samples());
        }

        if count == 0 {
            return Stats::empty(AGGREGATED);
        }

        let successes = count - error_count;
        let error_rate_pct = error_count as f64 / count as f64 * 100.0;
        if successes == 0 {
            let mut stats = Stats::empty(AGGREGATED);
            stats.count = count;
            stats.error_count = error_count;
            stats.error_rate_pct = error_rate_pct;
            return stats;
        }

        merged.sort_unstable_by(|a, b| a.total_cmp(b));
        Stats {
            method: AGGREGATED,
            count,
            error_count,
            error_rate_pct,
            avg_ms: latency_sum / successes as f64,
            min_ms,
            max_ms,
            p50_ms: percentile(&merged, 50.0),
            p95_ms: percentile(&merged, 95.0),
            p99_ms: percentile(&merged, 99.0),
            latency_sum,
        }
    }

    /// Records dropped due to queue overflow so far.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

/// Final collector output, produced once by [`Collector::stop`].
#[derive(Debug)]
pub struct CollectorReport {
    pub per_kind: Vec<Stats>,
    pub aggregate: Stats,
    pub dropped: u64,
}

/// Bounded-queue result collector with a single ingestion task.
pub struct Collector {
    shared: Arc<Shared>,
    tx: mpsc::Sender<ResultRecord>,
    rx: Option<mpsc::Receiver<ResultRecord>>,
    handle: Option<JoinHandle<()>>,
}

impl Collector {
    /// Create a collector retaining `sample_capacity` latencies per kind and
    /// buffering up to `queue_capacity` in-flight records.
    pub fn new(sample_capacity: usize, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity);
        Collector {
            shared: Arc::new(Shared {
                metrics: RwLock::new(HashMap::new()),
                sample_capacity,
                dropped: AtomicU64::new(0),
            }),
            tx,
            rx: Some(rx),
            handle: None,
        }
    }

    /// Producer handle for workers.
    pub fn sink(&self) -> ResultSink {
        ResultSink {
            tx: self.tx.clone(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Read-only statistics view.
    pub fn view(&self) -> MetricsView {
        MetricsView {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Spawn the ingestion task. Records submitted before `start` stay queued
    /// (up to the channel capacity) and are ingested once it runs.
    pub fn start(&mut self) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };
        let shared = Arc::clone(&self.shared);
        self.handle = Some(tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                shared.apply(&record);
            }
            tracing::debug!("collector ingestion task finished");
        }));
    }

    /// Stop ingestion: close the producer side, drain everything already
    /// queued, and return the final statistics.
    ///
    /// All [`ResultSink`]s must have been dropped (workers joined) for the
    /// drain to terminate.
    pub async fn stop(mut self) -> Result<CollectorReport> {
        let view = self.view();
        drop(self.tx);
        if let Some(handle) = self.handle.take() {
            handle.await.map_err(BenchError::Join)?;
        }

        let dropped = view.dropped();
        if dropped > 0 {
            tracing::warn!(dropped, "statistics undercount by the dropped record total");
        }

        Ok(CollectorReport {
            per_kind: view.snapshots(),
            aggregate: view.aggregate(),
            dropped,
        })
    }
}
