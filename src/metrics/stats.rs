//! Per-kind latency accumulators and snapshot statistics.

use std::collections::VecDeque;

/// Aggregated metrics for one operation kind.
///
/// Counters and min/max/sum are exact over the whole run; the bounded sample
/// retains only the most recent successful latencies and is the basis for
/// percentile estimation. Once evictions occur, percentiles approximate the
/// true population.
#[derive(Debug)]
pub struct OpMetrics {
    count: u64,
    error_count: u64,
    latency_sum: f64,
    latency_min: f64,
    latency_max: f64,
    samples: VecDeque<f64>,
    capacity: usize,
}

impl OpMetrics {
    /// Create an empty accumulator retaining at most `capacity` latencies.
    pub fn new(capacity: usize) -> Self {
        OpMetrics {
            count: 0,
            error_count: 0,
            latency_sum: 0.0,
            latency_min: f64::INFINITY,
            latency_max: 0.0,
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Apply one result. Failed operations count toward the error rate only;
    /// their latency never reaches the sum, min/max, or the sample.
    pub fn record(&mut self, latency_ms: f64, failed: bool) {
        self.count += 1;
        if failed {
            self.error_count += 1;
            return;
        }

        self.latency_sum += latency_ms;
        if latency_ms < self.latency_min {
            self.latency_min = latency_ms;
        }
        if latency_ms > self.latency_max {
            self.latency_max = latency_ms;
        }

        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(latency_ms);
    }

    /// Total observed operations.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Total failed operations.
    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    /// Sum of successful latencies.
    pub fn latency_sum(&self) -> f64 {
        self.latency_sum
    }

    /// Exact minimum successful latency, if any success was observed.
    pub fn latency_min(&self) -> Option<f64> {
        (self.count > self.error_count).then_some(self.latency_min)
    }

    /// Exact maximum successful latency, if any success was observed.
    pub fn latency_max(&self) -> Option<f64> {
        (self.count > self.error_count).then_some(self.latency_max)
    }

    /// The retained latency sample, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    /// Compute snapshot statistics for this kind.
    pub fn stats(&self, method: &'static str) -> Stats {
        if self.count == 0 {
            return Stats::empty(method);
        }

        let successes = self.count - self.error_count;
        let error_rate_pct = self.error_count as f64 / self.count as f64 * 100.0;
        if successes == 0 {
            return Stats {
                error_rate_pct,
                ..Stats::counts_only(method, self.count, self.error_count)
            };
        }

        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_unstable_by(|a, b| a.total_cmp(b));

        Stats {
            method,
            count: self.count,
            error_count: self.error_count,
            error_rate_pct,
            avg_ms: self.latency_sum / successes as f64,
            min_ms: self.latency_min,
            max_ms: self.latency_max,
            p50_ms: percentile(&sorted, 50.0),
            p95_ms: percentile(&sorted, 95.0),
            p99_ms: percentile(&sorted, 99.0),
            latency_sum: self.latency_sum,
        }
    }
}

/// Computed statistics snapshot, derived on demand and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub method: &'static str,
    pub count: u64,
    pub error_count: u64,
    pub error_rate_pct: f64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub latency_sum: f64,
}

impl Stats {
    /// All-zero statistics for a method with no observations.
    pub fn empty(method: &'static str) -> Self {
        Stats::counts_only(method, 0, 0)
    }

    fn counts_only(method: &'static str, count: u64, error_count: u64) -> Self {
        Stats {
            method,
            count,
            error_count,
            error_rate_pct: 0.0,
            avg_ms: 0.0,
            min_ms: 0.0,
            max_ms: 0.0,
            p50_ms: 0.0,
            p95_ms: 0.0,
            p99_ms: 0.0,
            latency_sum: 0.0,
        }
    }

    /// Successful operation count.
    pub fn success_count(&self) -> u64 {
        self.count - self.error_count
    }
}

/// Exact order statistic with linear interpolation on a sorted sample.
///
/// Rank is `p/100 * (n-1)`; a fractional rank interpolates between the two
/// neighboring values.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = lower + 1;
    if upper >= sorted.len() {
        return sorted[lower];
    }

    let fraction = rank - lower as f64;
    sorted[lower] + fraction * (sorted[upper] - sorted[lower])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_percentile_interpolation() {
        let sample = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sample, 50.0), 3.0);
        // rank = 0.99 * 4 = 3.96, interpolated between 4 and 5.
        assert!((percentile(&sample, 99.0) - 4.96).abs() < 1e-9);
        assert_eq!(percentile(&sample, 0.0), 1.0);
        assert_eq!(percentile(&sample, 100.0), 5.0);
    }

    #[test]
    fn test_percentile_empty_and_single() {
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&[7.5], 99.0), 7.5);
    }

    #[test]
    fn test_count_invariant() {
        let mut metrics = OpMetrics::new(100);
        for _ in 0..7 {
            metrics.record(2.0, false);
        }
        for _ in 0..3 {
            metrics.record(99.0, true);
        }
        assert_eq!(metrics.count(), 10);
        assert_eq!(metrics.error_count(), 3);
        // Only the 7 successes contribute to the sum.
        assert!((metrics.latency_sum() - 14.0).abs() < 1e-9);
        let stats = metrics.stats("Get");
        assert_eq!(stats.success_count(), 7);
        assert!((stats.avg_ms - 2.0).abs() < 1e-9);
        assert!((stats.error_rate_pct - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_fifo_eviction() {
        let mut metrics = OpMetrics::new(3);
        for latency in [1.0, 2.0, 3.0, 4.0, 5.0] {
            metrics.record(latency, false);
        }
        let retained: Vec<f64> = metrics.samples().collect();
        assert_eq!(retained, vec![3.0, 4.0, 5.0]);
        // Min/max remain exact even after eviction.
        assert_eq!(metrics.latency_min(), Some(1.0));
        assert_eq!(metrics.latency_max(), Some(5.0));
    }

    #[test]
    fn test_all_failures_snapshot() {
        let mut metrics = OpMetrics::new(10);
        for _ in 0..4 {
            metrics.record(12.0, true);
        }
        let stats = metrics.stats("Delete");
        assert_eq!(stats.count, 4);
        assert_eq!(stats.error_count, 4);
        assert_eq!(stats.error_rate_pct, 100.0);
        assert_eq!(stats.avg_ms, 0.0);
        assert_eq!(stats.min_ms, 0.0);
        assert_eq!(stats.p99_ms, 0.0);
    }

    #[test]
    fn test_empty_snapshot() {
        let metrics = OpMetrics::new(10);
        assert_eq!(metrics.stats("Put"), Stats::empty("Put"));
    }
}
