//! kvbench - synthetic load generator for GRPC key-value stores.
//!
//! kvbench drives a configurable read/write/delete mix against a remote
//! `KeyValueStore` service through a pool of persistent connections, measures
//! per-operation latency, and reports streaming and final aggregate
//! statistics (throughput, error rate, latency percentiles).
//!
//! # Architecture
//!
//! - `workload`: fixed key population and per-write value generation
//! - `client`: GRPC connection pool and the `KeyValueStore` client
//! - `metrics`: bounded-queue result collector and percentile statistics
//! - `runner`: phase state machine, worker pool, progress reporting
//! - `export`: CSV sink and console report rendering
//! - `core`: configuration, errors, and shared domain types
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```no_run
//! use kvbench::core::ConfigBuilder;
//! use kvbench::runner::BenchmarkRunner;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigBuilder::new()
//!         .target_address("localhost:50051")
//!         .workers(16)
//!         .build()?;
//!     let summary = BenchmarkRunner::new(config).run().await?;
//!     println!("total ops: {}", summary.report.aggregate.count);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod cli;
pub mod client;
pub mod core;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod workload;

// Re-export core types for convenience
pub use crate::core::{Config, Result};
