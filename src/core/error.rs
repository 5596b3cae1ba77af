use thiserror::Error;

/// Errors produced by the benchmark core.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to open connection {index} to {target}: {source}")]
    Connect {
        index: usize,
        target: String,
        source: tonic::transport::Error,
    },

    #[error("entropy source failure: {0}")]
    Entropy(String),

    #[error("export error: {0}")]
    Export(String),

    #[error("GRPC error: {0}")]
    Grpc(#[from] tonic::Status),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("async task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("result channel closed")]
    ChannelClosed,
}

/// Result type alias for benchmark operations.
pub type Result<T> = std::result::Result<T, BenchError>;

impl BenchError {
    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new entropy-source error.
    pub fn entropy<S: Into<String>>(msg: S) -> Self {
        Self::Entropy(msg.into())
    }

    /// Creates a new export error.
    pub fn export<S: Into<String>>(msg: S) -> Self {
        Self::Export(msg.into())
    }

    /// Returns true if this error must abort the run before any phase starts.
    ///
    /// Setup failures (bad config, unreachable target, no entropy, unwritable
    /// CSV path) are fatal; everything else is absorbed into statistics or
    /// logged and the run completes.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Connect { .. } | Self::Entropy(_) | Self::Export(_)
        )
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Connect { .. } => "connect",
            Self::Entropy(_) => "entropy",
            Self::Export(_) => "export",
            Self::Grpc(_) => "grpc",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Join(_) => "async",
            Self::ChannelClosed => "channel",
        }
    }
}
