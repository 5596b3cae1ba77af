//! Domain types shared across the benchmark core.

use chrono::{DateTime, Utc};

/// The three workload actions issued against the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Read,
    Write,
    Delete,
}

impl OperationKind {
    /// All kinds, in reporting order.
    pub const ALL: [OperationKind; 3] = [
        OperationKind::Read,
        OperationKind::Write,
        OperationKind::Delete,
    ];

    /// Wire-level method name, used in reports and CSV rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Read => "Get",
            OperationKind::Write => "Put",
            OperationKind::Delete => "Delete",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weighted read/write/delete mix.
///
/// The weights define the probability of each kind per request; they must sum
/// to a positive total (the CLI additionally requires exactly 100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadMix {
    pub read: u32,
    pub write: u32,
    pub delete: u32,
}

impl WorkloadMix {
    /// Build a mix, rejecting an all-zero weight set and one whose total
    /// would not fit the `u32` draw range.
    pub fn new(read: u32, write: u32, delete: u32) -> Option<Self> {
        let total = u64::from(read) + u64::from(write) + u64::from(delete);
        if total == 0 || total > u64::from(u32::MAX) {
            return None;
        }
        Some(WorkloadMix {
            read,
            write,
            delete,
        })
    }

    /// Sum of all weights. Fits `u32` by construction.
    pub fn total(&self) -> u32 {
        self.read + self.write + self.delete
    }

    /// Map a uniform draw in `[0, total)` to an operation kind.
    ///
    /// Conceptually a draw from the weighted pool {Read x r, Write x w,
    /// Delete x d} without materializing it.
    pub fn choose(&self, roll: u32) -> OperationKind {
        debug_assert!(roll < self.total());
        if roll < self.read {
            OperationKind::Read
        } else if roll < self.read + self.write {
            OperationKind::Write
        } else {
            OperationKind::Delete
        }
    }
}

/// Outcome of a single RPC.
#[derive(Debug, Clone)]
pub enum Outcome {
    Ok,
    /// Failure reason, logged verbatim; transport and application errors are
    /// not distinguished in aggregate statistics.
    Err(String),
}

impl Outcome {
    pub fn is_err(&self) -> bool {
        matches!(self, Outcome::Err(_))
    }
}

/// One completed operation, emitted by a worker and consumed exactly once by
/// the collector.
#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub kind: OperationKind,
    pub latency_ms: f64,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
}

impl ResultRecord {
    pub fn new(kind: OperationKind, latency_ms: f64, outcome: Outcome) -> Self {
        ResultRecord {
            kind,
            latency_ms,
            outcome,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_rejects_zero_total() {
        assert!(WorkloadMix::new(0, 0, 0).is_none());
        assert!(WorkloadMix::new(70, 25, 5).is_some());
    }

    #[test]
    fn test_mix_rejects_overflowing_total() {
        assert!(WorkloadMix::new(u32::MAX, 101, 0).is_none());
        assert!(WorkloadMix::new(u32::MAX, 0, u32::MAX).is_none());
        assert!(WorkloadMix::new(u32::MAX, 0, 0).is_some());
    }

    #[test]
    fn test_record_carries_completion_time() {
        let before = Utc::now();
        let record = ResultRecord::new(OperationKind::Read, 1.5, Outcome::Ok);
        let after = Utc::now();
        assert!(record.timestamp >= before);
        assert!(record.timestamp <= after);
    }

    #[test]
    fn test_choose_boundaries() {
        let mix = WorkloadMix::new(70, 25, 5).unwrap();
        assert_eq!(mix.choose(0), OperationKind::Read);
        assert_eq!(mix.choose(69), OperationKind::Read);
        assert_eq!(mix.choose(70), OperationKind::Write);
        assert_eq!(mix.choose(94), OperationKind::Write);
        assert_eq!(mix.choose(95), OperationKind::Delete);
        assert_eq!(mix.choose(99), OperationKind::Delete);
    }

    #[test]
    fn test_choose_single_weight() {
        let mix = WorkloadMix::new(0, 0, 1).unwrap();
        assert_eq!(mix.choose(0), OperationKind::Delete);
    }

    #[test]
    fn test_method_names() {
        assert_eq!(OperationKind::Read.as_str(), "Get");
        assert_eq!(OperationKind::Write.as_str(), "Put");
        assert_eq!(OperationKind::Delete.as_str(), "Delete");
    }
}
