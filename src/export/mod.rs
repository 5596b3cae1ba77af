//! Rendering of aggregator snapshots: the CSV export sink, the periodic
//! progress line, and the final console report.

use crate::core::{BenchError, Result};
use crate::metrics::{CollectorReport, Stats};
use chrono::{Local, SecondsFormat, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CSV_HEADER: &str = "timestamp,method,total_ops,success_ops,error_ops,error_rate_pct,\
avg_latency_ms,p50_latency_ms,p95_latency_ms,p99_latency_ms,min_latency_ms,max_latency_ms,\
throughput_ops_per_sec";

/// CSV sink for aggregated metrics.
///
/// The file and header are written at construction, so an invalid path fails
/// the run before any workload starts. Exactly one data write happens at
/// finalize: one row per observed kind plus the AGGREGATED row.
#[derive(Debug)]
pub struct CsvSink {
    file: std::fs::File,
    path: PathBuf,
}

impl CsvSink {
    /// Create the output file and write the header.
    pub fn create(path: &Path) -> Result<Self> {
        let mut file = std::fs::File::create(path)
            .map_err(|e| BenchError::export(format!("failed to create {}: {}", path.display(), e)))?;
        writeln!(file, "{}", CSV_HEADER)
            .map_err(|e| BenchError::export(format!("failed to write CSV header: {}", e)))?;
        Ok(CsvSink {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Write the final rows. Called once at finalize; a failure here is
    /// reported by the caller but does not crash the completed benchmark.
    pub fn write_report(&mut self, report: &CollectorReport, elapsed: Duration) -> Result<()> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        let elapsed_secs = elapsed.as_secs_f64();

        let mut output = String::new();
        for stats in report
            .per_kind
            .iter()
            .filter(|s| s.count > 0)
            .chain(std::iter::once(&report.aggregate).filter(|s| s.count > 0))
        {
            output.push_str(&csv_row(stats, &timestamp, elapsed_secs));
            output.push('\n');
        }

        self.file
            .write_all(output.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|e| {
                BenchError::export(format!("failed to write {}: {}", self.path.display(), e))
            })
    }
}

fn csv_row(stats: &Stats, timestamp: &str, elapsed_secs: f64) -> String {
    let throughput = if elapsed_secs > 0.0 {
        stats.count as f64 / elapsed_secs
    } else {
        0.0
    };
    format!(
        "{},{},{},{},{},{:.2},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.0}",
        timestamp,
        stats.method,
        stats.count,
        stats.success_count(),
        stats.error_count,
        stats.error_rate_pct,
        stats.avg_ms,
        stats.p50_ms,
        stats.p95_ms,
        stats.p99_ms,
        stats.min_ms,
        stats.max_ms,
        throughput,
    )
}

/// One periodic progress line over the aggregate snapshot.
///
/// RPS is the cumulative count divided by elapsed measurement time, a
/// cumulative average rather than a windowed rate.
pub fn progress_line(total: &Stats, elapsed: Duration) -> String {
    let rps = if elapsed.as_secs_f64() > 0.0 {
        total.count as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };
    format!(
        "[{}] Total: {} | RPS: {:.0} | Avg: {:.1}ms | P50: {:.1}ms | P95: {:.1}ms | P99: {:.1}ms | Errors: {} ({:.1}%)",
        Local::now().format("%H:%M:%S"),
        total.count,
        rps,
        total.avg_ms,
        total.p50_ms,
        total.p95_ms,
        total.p99_ms,
        total.error_count,
        total.error_rate_pct,
    )
}

/// Render the final console report: one block per kind, then the aggregate
/// block with final throughput.
pub fn final_report(report: &CollectorReport, elapsed: Duration) -> String {
    let mut out = String::from("\n=== FINAL RESULTS ===\n");

    for stats in report.per_kind.iter().filter(|s| s.count > 0) {
        out.push_str(&format!("\n{}:\n", stats.method));
        out.push_str(&format!("  Count: {}\n", stats.count));
        out.push_str(&format!(
            "  Errors: {} ({:.2}%)\n",
            stats.error_count, stats.error_rate_pct
        ));
        out.push_str(&format!("  Avg Latency: {:.2}ms\n", stats.avg_ms));
        out.push_str(&format!("  P50 Latency: {:.2}ms\n", stats.p50_ms));
        out.push_str(&format!("  P95 Latency: {:.2}ms\n", stats.p95_ms));
        out.push_str(&format!("  P99 Latency: {:.2}ms\n", stats.p99_ms));
        out.push_str(&format!("  Min Latency: {:.2}ms\n", stats.min_ms));
        out.push_str(&format!("  Max Latency: {:.2}ms\n", stats.max_ms));
    }

    let total = &report.aggregate;
    if total.count > 0 {
        out.push_str("\n=== AGGREGATED STATISTICS ===\n");
        out.push_str(&format!("Total Operations: {}\n", total.count));
        out.push_str(&format!(
            "Total Errors: {} ({:.2}%)\n",
            total.error_count, total.error_rate_pct
        ));
        out.push_str(&format!("Overall Avg Latency: {:.2}ms\n", total.avg_ms));
        out.push_str(&format!("Overall P50 Latency: {:.2}ms\n", total.p50_ms));
        out.push_str(&format!("Overall P95 Latency: {:.2}ms\n", total.p95_ms));
        out.push_str(&format!("Overall P99 Latency: {:.2}ms\n", total.p99_ms));
        out.push_str(&format!("Overall Min Latency: {:.2}ms\n", total.min_ms));
        out.push_str(&format!("Overall Max Latency: {:.2}ms\n", total.max_ms));

        let elapsed_secs = elapsed.as_secs_f64();
        let throughput = if elapsed_secs > 0.0 {
            total.count as f64 / elapsed_secs
        } else {
            0.0
        };
        out.push_str(&format!("Final Throughput: {:.0} ops/sec\n", throughput));
    }

    if report.dropped > 0 {
        out.push_str(&format!(
            "Dropped Results: {} (statistics undercount by this amount)\n",
            report.dropped
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::AGGREGATED;
    use std::io::Read;

    fn sample_stats(method: &'static str) -> Stats {
        Stats {
            method,
            count: 100,
            error_count: 5,
            error_rate_pct: 5.0,
            avg_ms: 1.234,
            min_ms: 0.5,
            max_ms: 9.876,
            p50_ms: 1.0,
            p95_ms: 4.0,
            p99_ms: 8.0,
            latency_sum: 117.23,
        }
    }

    fn sample_report() -> CollectorReport {
        CollectorReport {
            per_kind: vec![sample_stats("Get")],
            aggregate: sample_stats(AGGREGATED),
            dropped: 0,
        }
    }

    #[test]
    fn test_csv_row_shape() {
        let row = csv_row(&sample_stats("Get"), "2026-01-01T00:00:00Z", 10.0);
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields.len(), 13);
        assert_eq!(fields[1], "Get");
        assert_eq!(fields[2], "100");
        assert_eq!(fields[3], "95");
        assert_eq!(fields[4], "5");
        assert_eq!(fields[5], "5.00");
        assert_eq!(fields[6], "1.234");
        assert_eq!(fields[12], "10"); // 100 ops / 10s
    }

    #[test]
    fn test_csv_file_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut sink = CsvSink::create(&path).unwrap();
        sink.write_report(&sample_report(), Duration::from_secs(10))
            .unwrap();

        let mut content = String::new();
        std::fs::File::open(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3); // header + Get + AGGREGATED
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].contains(",Get,"));
        assert!(lines[2].contains(",AGGREGATED,"));
    }

    #[test]
    fn test_csv_create_fails_on_bad_path() {
        let err = CsvSink::create(Path::new("/nonexistent-dir/out.csv")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_progress_line_format() {
        let line = progress_line(&sample_stats(AGGREGATED), Duration::from_secs(10));
        assert!(line.contains("Total: 100"));
        assert!(line.contains("RPS: 10"));
        assert!(line.contains("Avg: 1.2ms"));
        assert!(line.contains("Errors: 5 (5.0%)"));
    }

    #[test]
    fn test_final_report_blocks() {
        let text = final_report(&sample_report(), Duration::from_secs(10));
        assert!(text.contains("=== FINAL RESULTS ==="));
        assert!(text.contains("Get:"));
        assert!(text.contains("=== AGGREGATED STATISTICS ==="));
        assert!(text.contains("Final Throughput: 10 ops/sec"));
        assert!(!text.contains("Dropped Results"));
    }
}
