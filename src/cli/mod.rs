//! Command-line interface.
//!
//! Flag parsing and configuration resolution live here; the benchmark core
//! only ever sees a validated [`Config`]. Precedence:
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. JSON config file
//! 4. Defaults (lowest priority)

use crate::core::{BenchError, Config, ConfigBuilder, KeySelection, Result};
use crate::runner::BenchmarkRunner;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Synthetic load generator for GRPC key-value stores.
#[derive(Parser, Debug)]
#[command(name = "kvbench")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// GRPC address of the target key-value service
    #[arg(long, env = "KVBENCH_TARGET")]
    pub target: Option<String>,

    /// Number of GRPC connections
    #[arg(long, env = "KVBENCH_CONNECTIONS")]
    pub connections: Option<usize>,

    /// Number of concurrent workers
    #[arg(long, env = "KVBENCH_WORKERS")]
    pub workers: Option<usize>,

    /// Measurement duration (e.g. "30s", "2m")
    #[arg(long, env = "KVBENCH_DURATION", value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Warm-up duration; "0s" skips the warm-up phase
    #[arg(long, env = "KVBENCH_WARMUP", value_parser = parse_duration)]
    pub warmup: Option<Duration>,

    /// Number of unique keys
    #[arg(long = "keyspace", env = "KVBENCH_KEYSPACE")]
    pub key_space: Option<usize>,

    /// Size of values in bytes
    #[arg(long = "valuesize", env = "KVBENCH_VALUE_SIZE")]
    pub value_size: Option<usize>,

    /// Percentage of read operations
    #[arg(long = "read")]
    pub read_ratio: Option<u32>,

    /// Percentage of write operations
    #[arg(long = "write")]
    pub write_ratio: Option<u32>,

    /// Percentage of delete operations
    #[arg(long = "delete")]
    pub delete_ratio: Option<u32>,

    /// Progress report interval
    #[arg(long = "report-interval", env = "KVBENCH_REPORT_INTERVAL", value_parser = parse_duration)]
    pub report_interval: Option<Duration>,

    /// CSV output file path for aggregated metrics
    #[arg(long = "csv", env = "KVBENCH_CSV")]
    pub output_csv: Option<PathBuf>,

    /// Log every request
    #[arg(long)]
    pub log_requests: bool,

    /// Log failed requests
    #[arg(long)]
    pub log_errors: bool,

    /// Key selection randomness source
    #[arg(long, value_enum, env = "KVBENCH_KEY_SELECTION")]
    pub key_selection: Option<KeySelection>,

    /// JSON configuration file path
    #[arg(short, long, env = "KVBENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "KVBENCH_DEBUG")]
    pub debug: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Resolve the effective configuration.
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        if let Some(path) = &self.config {
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                BenchError::config(format!("failed to read config file {:?}: {}", path, e))
            })?;
            builder = builder.from_json(&content)?;
            tracing::info!("loaded configuration from {:?}", path);
        }

        self.apply_overrides(builder).build()
    }

    fn apply_overrides(&self, mut builder: ConfigBuilder) -> ConfigBuilder {
        if let Some(target) = &self.target {
            builder = builder.target_address(target.clone());
        }
        if let Some(count) = self.connections {
            builder = builder.connections(count);
        }
        if let Some(count) = self.workers {
            builder = builder.workers(count);
        }
        if let Some(d) = self.duration {
            builder = builder.duration(d);
        }
        if let Some(d) = self.warmup {
            builder = builder.warmup_duration(d);
        }
        if let Some(count) = self.key_space {
            builder = builder.key_space(count);
        }
        if let Some(bytes) = self.value_size {
            builder = builder.value_size(bytes);
        }
        if self.read_ratio.is_some() || self.write_ratio.is_some() || self.delete_ratio.is_some() {
            let defaults = Config::default();
            builder = builder.ratios(
                self.read_ratio.unwrap_or(defaults.read_ratio),
                self.write_ratio.unwrap_or(defaults.write_ratio),
                self.delete_ratio.unwrap_or(defaults.delete_ratio),
            );
        }
        if let Some(d) = self.report_interval {
            builder = builder.report_interval(d);
        }
        if self.output_csv.is_some() {
            builder = builder.output_csv(self.output_csv.clone());
        }
        if self.log_requests {
            builder = builder.log_requests(true);
        }
        if self.log_errors {
            builder = builder.log_errors(true);
        }
        if let Some(mode) = self.key_selection {
            builder = builder.key_selection(mode);
        }
        builder
    }

    /// Initialize logging.
    pub fn init_logging(&self) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let default_level = if self.debug { "debug" } else { "info" };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| BenchError::config(format!("failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Run the benchmark described by the CLI arguments.
pub async fn execute(cli: Cli) -> Result<()> {
    cli.init_logging()?;

    let config = cli.load_config().await?;
    let runner = BenchmarkRunner::new(config);
    let summary = runner.run().await?;

    tracing::info!(
        total_ops = summary.report.aggregate.count,
        errors = summary.report.aggregate.error_count,
        dropped = summary.report.dropped,
        elapsed = ?summary.elapsed,
        "benchmark complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_beat_defaults() {
        let cli = Cli::parse_from([
            "kvbench",
            "--target",
            "10.1.2.3:50051",
            "--workers",
            "4",
            "--duration",
            "2s",
            "--warmup",
            "0s",
            "--read",
            "100",
            "--write",
            "0",
            "--delete",
            "0",
        ]);
        let config = cli.apply_overrides(ConfigBuilder::new()).build().unwrap();
        assert_eq!(config.target_address, "10.1.2.3:50051");
        assert_eq!(config.workers, 4);
        assert_eq!(config.duration, Duration::from_secs(2));
        assert!(config.warmup_duration.is_zero());
        assert_eq!(config.read_ratio, 100);
        assert_eq!(config.delete_ratio, 0);
        // Untouched values keep defaults.
        assert_eq!(config.connections, 8);
    }

    #[test]
    fn test_partial_ratio_override_fails_validation() {
        // Overriding only --read leaves write/delete at their defaults, so
        // the sum check (130 != 100) rejects the combination.
        let cli = Cli::parse_from(["kvbench", "--read", "100"]);
        assert!(cli.apply_overrides(ConfigBuilder::new()).build().is_err());
    }

    #[test]
    fn test_duration_parsing() {
        let cli = Cli::parse_from(["kvbench", "--duration", "1m", "--report-interval", "500ms"]);
        assert_eq!(cli.duration, Some(Duration::from_secs(60)));
        assert_eq!(cli.report_interval, Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_key_selection_flag() {
        let cli = Cli::parse_from(["kvbench", "--key-selection", "fast"]);
        assert_eq!(cli.key_selection, Some(KeySelection::Fast));
    }
}
