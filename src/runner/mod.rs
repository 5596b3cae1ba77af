//! Benchmark orchestration: phase sequencing, the worker pool, and progress
//! reporting.
//!
//! A run walks a linear state machine with no back-edges:
//!
//! ```text
//! Idle -> HealthChecking -> WarmingUp -> Measuring -> Finalizing -> Done
//! ```
//!
//! Warm-up and measurement execute the identical worker loop; the only
//! difference is that warm-up never submits results, so both phases exercise
//! the same connection-selection, key-selection, and RPC paths.

use crate::client::{ConnectionPool, KvClient};
use crate::core::{
    BenchError, Config, KeySelection, OperationKind, Outcome, Result, ResultRecord, WorkloadMix,
};
use crate::export::{self, CsvSink};
use crate::metrics::{Collector, CollectorReport, MetricsView, ResultSink};
use crate::workload::KeyPopulation;
use rand::rngs::OsRng;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

/// Run phases, in order. The orchestrator never moves backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Idle,
    HealthChecking,
    WarmingUp,
    Measuring,
    Finalizing,
    Done,
}

/// Final output of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    pub report: CollectorReport,
    /// Wall-clock duration of the measurement phase.
    pub elapsed: Duration,
}

/// Owns the connection pool, collector, and worker tasks for one run.
///
/// All state is per-run; nothing survives into the next invocation.
pub struct BenchmarkRunner {
    config: Config,
    phase: Phase,
}

impl BenchmarkRunner {
    pub fn new(config: Config) -> Self {
        BenchmarkRunner {
            config,
            phase: Phase::Idle,
        }
    }

    fn transition(&mut self, next: Phase) {
        debug_assert!(next > self.phase, "phase transitions are linear");
        tracing::info!(from = ?self.phase, to = ?next, "phase transition");
        self.phase = next;
    }

    /// Execute the full benchmark and return the final statistics.
    ///
    /// Setup failures (config, CSV path, key generation, connections) abort
    /// before any phase starts; everything after that is absorbed into
    /// statistics and logs.
    pub async fn run(mut self) -> Result<RunSummary> {
        self.config.validate()?;
        let mix = self.config.workload_mix()?;

        tracing::info!("starting benchmark: {}", self.config);

        // CSV file creation is fatal up front so a bad path never wastes a run.
        let mut csv = self
            .config
            .output_csv
            .as_deref()
            .map(CsvSink::create)
            .transpose()?;

        let keys = Arc::new(KeyPopulation::generate(
            self.config.key_space,
            self.config.key_selection,
        )?);
        let mut pool =
            ConnectionPool::connect(&self.config.endpoint(), self.config.connections).await?;

        let mut collector = Collector::new(
            self.config.latency_sample_size,
            self.config.result_queue_size,
        );
        collector.start();

        self.transition(Phase::HealthChecking);
        let failures = pool.health_check(self.config.health_check_timeout).await;
        for (index, status) in &failures {
            tracing::warn!(connection = *index, %status, "health check failed");
        }
        if failures.is_empty() {
            tracing::info!(connections = pool.len(), "health check passed");
        }

        if !self.config.warmup_duration.is_zero() {
            self.transition(Phase::WarmingUp);
            tracing::info!(duration = ?self.config.warmup_duration, "warm-up phase");
            self.run_workers(&pool, &keys, mix, self.config.warmup_duration, None)
                .await?;
            tracing::info!("warm-up phase completed");
        }

        self.transition(Phase::Measuring);
        tracing::info!(duration = ?self.config.duration, "measurement phase");
        let started = Instant::now();

        let (stop_tx, stop_rx) = watch::channel(false);
        let progress = tokio::spawn(progress_loop(
            collector.view(),
            self.config.report_interval,
            started,
            stop_rx,
        ));

        let run_result = self
            .run_workers(
                &pool,
                &keys,
                mix,
                self.config.duration,
                Some(collector.sink()),
            )
            .await;
        let elapsed = started.elapsed();

        // Stop the progress task before finalizing so its output cannot
        // interleave with the final report.
        let _ = stop_tx.send(true);
        progress.await.map_err(BenchError::Join)?;
        run_result?;

        self.transition(Phase::Finalizing);
        let report = collector.stop().await?;
        print!("{}", export::final_report(&report, elapsed));

        if let Some(sink) = csv.as_mut() {
            // The benchmark already completed; a write failure here is
            // reported, not fatal.
            if let Err(e) = sink.write_report(&report, elapsed) {
                tracing::error!(error = %e, "failed to write CSV report");
            }
        }

        pool.close();
        self.transition(Phase::Done);

        Ok(RunSummary { report, elapsed })
    }

    /// Launch the full worker set for one phase and join every worker.
    ///
    /// `sink` is `None` during warm-up, which is the only difference between
    /// the two phases. No worker outlives the phase deadline: the loop checks
    /// it between requests and every in-flight RPC is capped by the remaining
    /// budget.
    async fn run_workers(
        &self,
        pool: &ConnectionPool,
        keys: &Arc<KeyPopulation>,
        mix: WorkloadMix,
        duration: Duration,
        sink: Option<ResultSink>,
    ) -> Result<()> {
        let deadline = Instant::now() + duration;
        let mut workers = JoinSet::new();

        for id in 0..self.config.workers {
            let ctx = WorkerContext {
                id,
                client: pool.acquire(),
                keys: Arc::clone(keys),
                mix,
                value_size: self.config.value_size,
                key_selection: self.config.key_selection,
                deadline,
                sink: sink.clone(),
                log_requests: self.config.log_requests,
                log_errors: self.config.log_errors,
            };
            workers.spawn(worker_loop(ctx));
        }
        drop(sink);

        while let Some(joined) = workers.join_next().await {
            joined.map_err(BenchError::Join)?;
        }
        Ok(())
    }
}

struct WorkerContext {
    id: usize,
    client: KvClient,
    keys: Arc<KeyPopulation>,
    mix: WorkloadMix,
    value_size: usize,
    key_selection: KeySelection,
    deadline: Instant,
    sink: Option<ResultSink>,
    log_requests: bool,
    log_errors: bool,
}

impl WorkerContext {
    /// Uniform draw over the weighted operation pool.
    fn roll(&self) -> u32 {
        weighted_roll(self.key_selection, self.mix.total())
    }
}

fn weighted_roll(selection: KeySelection, total: u32) -> u32 {
    match selection {
        KeySelection::Secure => OsRng.gen_range(0..total),
        KeySelection::Fast => fastrand::u32(0..total),
    }
}

/// Tight request loop run by every worker task.
async fn worker_loop(ctx: WorkerContext) {
    while Instant::now() < ctx.deadline {
        perform_operation(&ctx).await;
    }
}

async fn perform_operation(ctx: &WorkerContext) {
    let kind = ctx.mix.choose(ctx.roll());
    let key = ctx.keys.next_key();

    let remaining = ctx.deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return;
    }

    let start = std::time::Instant::now();
    let rpc = async {
        match kind {
            OperationKind::Read => ctx.client.get(key).await.map(|_| ()),
            OperationKind::Write => {
                let value = ctx.keys.next_value(ctx.value_size);
                ctx.client.put(key, value).await
            },
            OperationKind::Delete => ctx.client.delete(key).await,
        }
    };
    let outcome = match tokio::time::timeout(remaining, rpc).await {
        Ok(Ok(())) => Outcome::Ok,
        Ok(Err(status)) => Outcome::Err(status.to_string()),
        // A call cut off by the phase deadline is an ordinary failure.
        Err(_) => Outcome::Err("deadline exceeded".to_string()),
    };
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    let record = ResultRecord::new(kind, latency_ms, outcome);

    match &record.outcome {
        Outcome::Err(reason) if ctx.log_errors || ctx.log_requests => {
            tracing::warn!(
                worker = ctx.id,
                op = %record.kind,
                key = %hex::encode(key),
                completed = %record.timestamp,
                error = %reason,
                "request failed"
            );
        },
        Outcome::Ok if ctx.log_requests => {
            tracing::debug!(
                worker = ctx.id,
                op = %record.kind,
                key = %hex::encode(key),
                completed = %record.timestamp,
                latency_ms = record.latency_ms,
                "request succeeded"
            );
        },
        _ => {},
    }

    if let Some(sink) = &ctx.sink {
        sink.submit(record);
    }
}

/// Periodic progress reporter, active only during the measurement phase.
async fn progress_loop(
    view: MetricsView,
    interval: Duration,
    started: Instant,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; skip it so the first line lands
    // one full interval into the phase.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let total = view.aggregate();
                if total.count > 0 {
                    println!("{}", export::progress_line(&total, started.elapsed()));
                }
            },
            _ = stop.changed() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases_are_ordered() {
        assert!(Phase::Idle < Phase::HealthChecking);
        assert!(Phase::HealthChecking < Phase::WarmingUp);
        assert!(Phase::WarmingUp < Phase::Measuring);
        assert!(Phase::Measuring < Phase::Finalizing);
        assert!(Phase::Finalizing < Phase::Done);
    }

    #[test]
    fn test_operation_mix_converges() {
        let mix = WorkloadMix::new(70, 25, 5).unwrap();
        let draws = 100_000;
        let mut counts = [0u32; 3];
        for _ in 0..draws {
            match mix.choose(fastrand::u32(0..mix.total())) {
                OperationKind::Read => counts[0] += 1,
                OperationKind::Write => counts[1] += 1,
                OperationKind::Delete => counts[2] += 1,
            }
        }
        let pct = |n: u32| n as f64 / draws as f64 * 100.0;
        assert!((pct(counts[0]) - 70.0).abs() < 2.0, "read {}", pct(counts[0]));
        assert!((pct(counts[1]) - 25.0).abs() < 2.0, "write {}", pct(counts[1]));
        assert!((pct(counts[2]) - 5.0).abs() < 2.0, "delete {}", pct(counts[2]));
    }

    #[test]
    fn test_roll_stays_in_range() {
        for selection in [KeySelection::Secure, KeySelection::Fast] {
            for _ in 0..1000 {
                assert!(weighted_roll(selection, 100) < 100);
            }
        }
    }
}
