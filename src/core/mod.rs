//! Core domain models: errors, configuration, and shared types.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, ConfigBuilder, KeySelection};
pub use error::{BenchError, Result};
pub use types::{OperationKind, Outcome, ResultRecord, WorkloadMix};
