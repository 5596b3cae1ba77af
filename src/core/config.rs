//! Benchmark configuration.
//!
//! Configuration is resolved with the usual precedence:
//! CLI arguments > environment variables > JSON config file > defaults.
//! This module owns the value set itself plus validation; flag parsing lives
//! in [`crate::cli`].

use crate::core::{BenchError, Result, WorkloadMix};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How worker tasks pick a key index per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KeySelection {
    /// Draw from the OS entropy source per selection. Unbiased, slower.
    Secure,
    /// Draw from a seeded userspace PRNG. Faster, trades sampling rigor for
    /// throughput.
    Fast,
}

/// Complete benchmark configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GRPC address of the target key-value service.
    pub target_address: String,
    /// Number of GRPC connections to open.
    pub connections: usize,
    /// Number of concurrent worker tasks.
    pub workers: usize,
    /// Measurement phase duration.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Warm-up phase duration (results discarded); zero skips the phase.
    #[serde(with = "humantime_serde")]
    pub warmup_duration: Duration,
    /// Number of unique keys in the population.
    pub key_space: usize,
    /// Size of generated values in bytes.
    pub value_size: usize,
    /// Percentage of read operations.
    pub read_ratio: u32,
    /// Percentage of write operations.
    pub write_ratio: u32,
    /// Percentage of delete operations.
    pub delete_ratio: u32,
    /// Interval between progress lines during measurement.
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,
    /// Optional CSV output path for aggregated metrics.
    pub output_csv: Option<PathBuf>,
    /// Log every request.
    pub log_requests: bool,
    /// Log failed requests.
    pub log_errors: bool,
    /// Key selection randomness source.
    pub key_selection: KeySelection,
    /// Per-kind latency sample retention for percentile estimation.
    pub latency_sample_size: usize,
    /// Capacity of the result queue between workers and the collector.
    pub result_queue_size: usize,
    /// Total time budget for the startup health check.
    #[serde(with = "humantime_serde")]
    pub health_check_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target_address: "localhost:50051".to_string(),
            connections: 8,
            workers: 100,
            duration: Duration::from_secs(30),
            warmup_duration: Duration::from_secs(5),
            key_space: 50_000,
            value_size: 1024,
            read_ratio: 70,
            write_ratio: 25,
            delete_ratio: 5,
            report_interval: Duration::from_secs(5),
            output_csv: None,
            log_requests: false,
            log_errors: false,
            key_selection: KeySelection::Secure,
            latency_sample_size: 10_000,
            result_queue_size: 10_000,
            health_check_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.target_address.is_empty() {
            return Err(BenchError::config("target address cannot be empty"));
        }
        if self.connections == 0 {
            return Err(BenchError::config("number of connections must be positive"));
        }
        if self.workers == 0 {
            return Err(BenchError::config("number of workers must be positive"));
        }
        if self.duration.is_zero() {
            return Err(BenchError::config("duration must be positive"));
        }
        if self.key_space == 0 {
            return Err(BenchError::config("key space must be positive"));
        }
        if self.value_size == 0 {
            return Err(BenchError::config("value size must be positive"));
        }
        // Summed in u64: the three ratios are user input and may each be
        // anywhere in u32 range.
        let ratio_sum = u64::from(self.read_ratio)
            + u64::from(self.write_ratio)
            + u64::from(self.delete_ratio);
        if ratio_sum != 100 {
            return Err(BenchError::config(format!(
                "operation ratios must sum to 100, got {ratio_sum}"
            )));
        }
        if self.report_interval.is_zero() {
            return Err(BenchError::config("report interval must be positive"));
        }
        if self.latency_sample_size == 0 {
            return Err(BenchError::config("latency sample size must be positive"));
        }
        if self.result_queue_size == 0 {
            return Err(BenchError::config("result queue size must be positive"));
        }
        Ok(())
    }

    /// The configured operation mix.
    ///
    /// `validate` guarantees a positive total, so this cannot fail afterward.
    pub fn workload_mix(&self) -> Result<WorkloadMix> {
        WorkloadMix::new(self.read_ratio, self.write_ratio, self.delete_ratio)
            .ok_or_else(|| BenchError::config("operation ratios cannot all be zero"))
    }

    /// GRPC endpoint URI for the target address.
    pub fn endpoint(&self) -> String {
        if self.target_address.contains("://") {
            self.target_address.clone()
        } else {
            format!("http://{}", self.target_address)
        }
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Target: {}, Connections: {}, Workers: {}, Duration: {:?}, \
             KeySpace: {}, ValueSize: {}, Read: {}%, Write: {}%, Delete: {}%",
            self.target_address,
            self.connections,
            self.workers,
            self.duration,
            self.key_space,
            self.value_size,
            self.read_ratio,
            self.write_ratio,
            self.delete_ratio,
        )
    }
}

/// Configuration builder for programmatic construction.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from a JSON string, replacing current values.
    pub fn from_json(mut self, json: &str) -> Result<Self> {
        self.config = serde_json::from_str(json)
            .map_err(|e| BenchError::config(format!("failed to parse JSON config: {}", e)))?;
        Ok(self)
    }

    /// Set the target address.
    pub fn target_address<S: Into<String>>(mut self, addr: S) -> Self {
        self.config.target_address = addr.into();
        self
    }

    /// Set the connection count.
    pub fn connections(mut self, count: usize) -> Self {
        self.config.connections = count;
        self
    }

    /// Set the worker count.
    pub fn workers(mut self, count: usize) -> Self {
        self.config.workers = count;
        self
    }

    /// Set the measurement duration.
    pub fn duration(mut self, d: Duration) -> Self {
        self.config.duration = d;
        self
    }

    /// Set the warm-up duration.
    pub fn warmup_duration(mut self, d: Duration) -> Self {
        self.config.warmup_duration = d;
        self
    }

    /// Set the key space size.
    pub fn key_space(mut self, count: usize) -> Self {
        self.config.key_space = count;
        self
    }

    /// Set the value size in bytes.
    pub fn value_size(mut self, bytes: usize) -> Self {
        self.config.value_size = bytes;
        self
    }

    /// Set the read/write/delete percentages.
    pub fn ratios(mut self, read: u32, write: u32, delete: u32) -> Self {
        self.config.read_ratio = read;
        self.config.write_ratio = write;
        self.config.delete_ratio = delete;
        self
    }

    /// Set the progress report interval.
    pub fn report_interval(mut self, d: Duration) -> Self {
        self.config.report_interval = d;
        self
    }

    /// Set the CSV output path.
    pub fn output_csv(mut self, path: Option<PathBuf>) -> Self {
        self.config.output_csv = path;
        self
    }

    /// Set request logging.
    pub fn log_requests(mut self, enable: bool) -> Self {
        self.config.log_requests = enable;
        self
    }

    /// Set error logging.
    pub fn log_errors(mut self, enable: bool) -> Self {
        self.config.log_errors = enable;
        self
    }

    /// Set the key selection mode.
    pub fn key_selection(mut self, mode: KeySelection) -> Self {
        self.config.key_selection = mode;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ratio_sum_near_u32_max_is_rejected() {
        // A pair that wraps to exactly 100 in u32 arithmetic must still fail.
        let config = ConfigBuilder::new().ratios(u32::MAX, 101, 0).build();
        assert!(config.is_err());
    }

    #[test]
    fn test_ratio_sum_enforced() {
        let config = ConfigBuilder::new().ratios(70, 25, 10).build();
        assert!(config.is_err());

        let config = ConfigBuilder::new().ratios(100, 0, 0).build();
        assert!(config.is_ok());
    }

    #[test]
    fn test_zero_counts_rejected() {
        assert!(ConfigBuilder::new().workers(0).build().is_err());
        assert!(ConfigBuilder::new().connections(0).build().is_err());
        assert!(ConfigBuilder::new().key_space(0).build().is_err());
        assert!(ConfigBuilder::new().value_size(0).build().is_err());
        assert!(ConfigBuilder::new()
            .duration(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_json_parsing() {
        let json = r#"
        {
            "target_address": "10.0.0.5:50051",
            "connections": 4,
            "workers": 16,
            "duration": "10s",
            "warmup_duration": "1s",
            "read_ratio": 50,
            "write_ratio": 40,
            "delete_ratio": 10,
            "key_selection": "fast"
        }
        "#;

        let config = ConfigBuilder::new().from_json(json).unwrap().build().unwrap();
        assert_eq!(config.target_address, "10.0.0.5:50051");
        assert_eq!(config.connections, 4);
        assert_eq!(config.workers, 16);
        assert_eq!(config.duration, Duration::from_secs(10));
        assert_eq!(config.key_selection, KeySelection::Fast);
        // Unspecified fields keep defaults.
        assert_eq!(config.key_space, 50_000);
        assert_eq!(config.value_size, 1024);
    }

    #[test]
    fn test_endpoint_scheme() {
        let config = Config::default();
        assert_eq!(config.endpoint(), "http://localhost:50051");

        let config = ConfigBuilder::new()
            .target_address("https://kv.example.com:443")
            .build()
            .unwrap();
        assert_eq!(config.endpoint(), "https://kv.example.com:443");
    }
}
