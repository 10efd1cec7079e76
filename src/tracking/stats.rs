use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-run submission and settlement counters
///
/// Updated from arbitrary threads. While operations are in flight the counts are
/// a safe lower bound; `succeeded + failed == submitted` holds at quiescence.
#[derive(Debug, Default)]
pub struct JobStats {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl JobStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submission(&self) -> u64 {
        self.submitted.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn record_success(&self) -> u64 {
        self.succeeded.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn record_failure(&self) -> u64 {
        self.failed.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Acquire)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Acquire)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Acquire)
    }

    pub fn settled(&self) -> u64 {
        self.succeeded() + self.failed()
    }

    pub fn outstanding(&self) -> u64 {
        let settled = self.settled();
        self.submitted().saturating_sub(settled)
    }

    /// Every submission known so far has settled
    pub fn is_quiescent(&self) -> bool {
        // Settled is read before submitted: a settlement is always recorded after
        // its submission, so equality here cannot come from a stale submitted count.
        let settled = self.settled();
        settled >= self.submitted()
    }

    pub fn snapshot(&self) -> JobStatsSnapshot {
        let succeeded = self.succeeded();
        let failed = self.failed();
        JobStatsSnapshot {
            submitted: self.submitted(),
            succeeded,
            failed,
        }
    }
}

/// Point-in-time copy of [`JobStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatsSnapshot {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl JobStatsSnapshot {
    pub fn settled(&self) -> u64 {
        self.succeeded + self.failed
    }

    pub fn outstanding(&self) -> u64 {
        self.submitted.saturating_sub(self.settled())
    }

    /// Succeeded share of submitted, in percent rounded to two decimals
    pub fn success_rate(&self) -> f64 {
        if self.submitted == 0 {
            return 0.0;
        }
        let rate = self.succeeded as f64 * 100.0 / self.submitted as f64;
        (rate * 100.0).round() / 100.0
    }
}
