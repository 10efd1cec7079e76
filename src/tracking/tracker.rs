use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::stats::{JobStats, JobStatsSnapshot};
use crate::config::BatchJobConfig;
use crate::error::BatchResult;
use crate::execution::{Dispatcher, PendingResult, ShutdownOutcome};

/// Result of a bounded drain wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DrainOutcome {
    /// Every submitted operation settled
    Drained,
    /// The wait ceiling elapsed with operations still in flight
    TimedOut { outstanding: u64 },
}

impl DrainOutcome {
    pub fn is_drained(&self) -> bool {
        matches!(self, DrainOutcome::Drained)
    }
}

/// Counts submitted versus settled operations and offers a bounded drain wait
///
/// Settlement counting runs on a dedicated single-worker [`Dispatcher`], so a
/// slow business continuation can never delay the counts that gate shutdown.
///
/// The drain is best effort: a timeout is reported, never raised, and the
/// operations still in flight keep running after the wait returns.
#[derive(Clone)]
pub struct CompletionTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    job_name: String,
    stats: JobStats,
    started_at: Instant,
    dispatcher: Dispatcher,
    poll_interval: Duration,
    shutdown_grace: Duration,
    force_window: Duration,
    signal: Mutex<()>,
    changed: Condvar,
    /// Held for the whole drain so concurrent callers wait for the first one
    draining: Mutex<()>,
    drain: Mutex<Option<DrainOutcome>>,
    dispatcher_shutdown: Mutex<Option<ShutdownOutcome>>,
}

impl TrackerInner {
    fn notify(&self) {
        let _guard = self.signal.lock();
        self.changed.notify_all();
    }
}

impl CompletionTracker {
    /// Tracker with the default poll interval and shutdown windows
    pub fn new(job_name: impl Into<String>) -> BatchResult<Self> {
        let config = BatchJobConfig {
            job_name: job_name.into(),
            ..BatchJobConfig::default()
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &BatchJobConfig) -> BatchResult<Self> {
        let dispatcher = Dispatcher::single(format!("{}-stats", config.job_name))?;

        Ok(Self {
            inner: Arc::new(TrackerInner {
                job_name: config.job_name.clone(),
                stats: JobStats::new(),
                started_at: Instant::now(),
                dispatcher,
                poll_interval: config.drain_poll_interval(),
                shutdown_grace: config.dispatcher_shutdown_grace(),
                force_window: config.dispatcher_force_window(),
                signal: Mutex::new(()),
                changed: Condvar::new(),
                draining: Mutex::new(()),
                drain: Mutex::new(None),
                dispatcher_shutdown: Mutex::new(None),
            }),
        })
    }

    /// Count one submission
    ///
    /// Must be called before [`CompletionTracker::observe`] for the same
    /// operation so a settlement can never be counted ahead of its submission.
    pub fn record_submission(&self) {
        self.inner.stats.record_submission();
        self.inner.notify();
    }

    /// Count the settlement of `pending` once it happens
    pub fn observe<R>(&self, pending: &PendingResult<R>)
    where
        R: Send + Sync + 'static,
    {
        let inner = Arc::clone(&self.inner);
        pending.on_settled(&self.inner.dispatcher, move |outcome| {
            match outcome {
                Ok(_) => inner.stats.record_success(),
                Err(_) => inner.stats.record_failure(),
            };
            inner.notify();
        });
    }

    /// Block until every known submission settled or `max_wait` elapses
    ///
    /// Afterwards the counting dispatcher is shut down and the final counts are
    /// logged. Calling this again returns the first outcome immediately.
    pub fn await_drain_or_timeout(&self, max_wait: Duration) -> DrainOutcome {
        let _draining = self.inner.draining.lock();
        if let Some(outcome) = self.drain_outcome() {
            debug!(job_name = %self.inner.job_name, "Drain already completed");
            return outcome;
        }

        let outcome = self.wait_for_quiescence(max_wait);
        if let DrainOutcome::TimedOut { outstanding } = outcome {
            warn!(
                job_name = %self.inner.job_name,
                outstanding = outstanding,
                max_wait_seconds = max_wait.as_secs_f64(),
                "⏰ Drain wait timed out with operations still in flight"
            );
        }

        let shutdown = self
            .inner
            .dispatcher
            .shutdown(self.inner.shutdown_grace, self.inner.force_window);
        *self.inner.dispatcher_shutdown.lock() = Some(shutdown);

        self.report_stats();
        *self.inner.drain.lock() = Some(outcome);
        outcome
    }

    fn wait_for_quiescence(&self, max_wait: Duration) -> DrainOutcome {
        let inner = &self.inner;
        let deadline = Instant::now().checked_add(max_wait);
        let mut guard = inner.signal.lock();

        loop {
            if inner.stats.is_quiescent() {
                return DrainOutcome::Drained;
            }

            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                return DrainOutcome::TimedOut {
                    outstanding: inner.stats.outstanding(),
                };
            }

            // Re-check at the poll interval even without a signal
            let wake_at = match (now.checked_add(inner.poll_interval), deadline) {
                (Some(poll_at), Some(deadline)) => Some(poll_at.min(deadline)),
                (poll_at, deadline) => poll_at.or(deadline),
            };
            match wake_at {
                Some(wake_at) => {
                    inner.changed.wait_until(&mut guard, wake_at);
                }
                None => inner.changed.wait(&mut guard),
            }
        }
    }

    fn report_stats(&self) {
        let stats = self.stats();
        info!(
            job_name = %self.inner.job_name,
            submitted = stats.submitted,
            succeeded = stats.succeeded,
            failed = stats.failed,
            success_rate = stats.success_rate(),
            "📊 Completed processing {} records: {} succeeded ({:.2}%) in {:.2} seconds. {} records failed",
            stats.submitted,
            stats.succeeded,
            stats.success_rate(),
            self.elapsed().as_secs_f64(),
            stats.failed
        );
    }

    pub fn stats(&self) -> JobStatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn outstanding(&self) -> u64 {
        self.inner.stats.outstanding()
    }

    /// Time since the tracker was created
    pub fn elapsed(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    /// Outcome of the first drain wait, if one has completed
    ///
    /// Never blocks on a drain that is still in progress.
    pub fn drain_outcome(&self) -> Option<DrainOutcome> {
        *self.inner.drain.lock()
    }

    /// How the counting dispatcher shut down, if it has
    pub fn dispatcher_shutdown(&self) -> Option<ShutdownOutcome> {
        *self.inner.dispatcher_shutdown.lock()
    }

    pub fn job_name(&self) -> &str {
        &self.inner.job_name
    }
}

impl fmt::Debug for CompletionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionTracker")
            .field("job_name", &self.inner.job_name)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::TaskFailure;

    fn fast_tracker() -> CompletionTracker {
        let config = BatchJobConfig {
            job_name: "tracker_test".to_string(),
            drain_poll_interval_ms: 10,
            dispatcher_shutdown_grace_seconds: 1,
            dispatcher_force_window_seconds: 1,
            ..BatchJobConfig::default()
        };
        CompletionTracker::from_config(&config).unwrap()
    }

    #[test]
    fn waits_for_success_settled_on_another_thread() {
        let tracker = fast_tracker();
        let (pending, completer) = PendingResult::<u32>::channel();
        tracker.record_submission();
        tracker.observe(&pending);

        let worker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            completer.succeed(1);
        });

        let outcome = tracker.await_drain_or_timeout(Duration::from_secs(5));
        worker.join().unwrap();

        assert_eq!(outcome, DrainOutcome::Drained);
        let stats = tracker.stats();
        assert_eq!(stats.submitted, stats.succeeded + stats.failed);
        assert_eq!(stats.succeeded, 1);
    }

    #[test]
    fn waits_for_failure_settled_on_another_thread() {
        let tracker = fast_tracker();
        let (pending, completer) = PendingResult::<u32>::channel();
        tracker.record_submission();
        tracker.observe(&pending);

        let worker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            completer.fail(TaskFailure::new("RuntimeError", "OOOPPS!"));
        });

        let outcome = tracker.await_drain_or_timeout(Duration::from_secs(5));
        worker.join().unwrap();

        assert!(outcome.is_drained());
        assert_eq!(tracker.stats().failed, 1);
    }

    #[test]
    fn timeout_reports_partial_counts() {
        let tracker = fast_tracker();
        let (settled, settled_completer) = PendingResult::<u32>::channel();
        let (stuck, _stuck_completer) = PendingResult::<u32>::channel();

        for pending in [&settled, &stuck] {
            tracker.record_submission();
            tracker.observe(pending);
        }
        settled_completer.succeed(1);

        let started = Instant::now();
        let outcome = tracker.await_drain_or_timeout(Duration::from_millis(150));

        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(outcome, DrainOutcome::TimedOut { outstanding: 1 });
        let stats = tracker.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.settled(), 1);
    }

    #[test]
    fn second_drain_returns_immediately_with_same_counts() {
        let tracker = fast_tracker();
        tracker.record_submission();
        tracker.observe(&PendingResult::succeeded(1u8));

        let first = tracker.await_drain_or_timeout(Duration::from_secs(5));
        let stats = tracker.stats();

        let started = Instant::now();
        let second = tracker.await_drain_or_timeout(Duration::from_secs(5));

        assert_eq!(first, second);
        assert_eq!(tracker.stats(), stats);
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(tracker.dispatcher_shutdown(), Some(ShutdownOutcome::Graceful));
    }

    #[test]
    fn empty_tracker_drains_immediately() {
        let tracker = fast_tracker();
        let outcome = tracker.await_drain_or_timeout(Duration::from_secs(5));
        assert!(outcome.is_drained());
        assert_eq!(tracker.stats(), JobStatsSnapshot::default());
    }

    #[test]
    fn drain_outcome_does_not_block_while_a_drain_is_running() {
        let tracker = fast_tracker();
        let (pending, completer) = PendingResult::<u32>::channel();
        tracker.record_submission();
        tracker.observe(&pending);

        let draining = tracker.clone();
        let drain = std::thread::spawn(move || {
            draining.await_drain_or_timeout(Duration::from_secs(30))
        });
        std::thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        assert_eq!(tracker.drain_outcome(), None);
        assert!(started.elapsed() < Duration::from_millis(100));

        completer.succeed(7);
        let outcome = drain.join().unwrap();

        assert_eq!(outcome, DrainOutcome::Drained);
        assert_eq!(tracker.drain_outcome(), Some(DrainOutcome::Drained));
    }

    #[test]
    fn unbounded_shutdown_windows_drain_without_overflow() {
        let config = BatchJobConfig {
            job_name: "unbounded_tracker".to_string(),
            drain_poll_interval_ms: 10,
            dispatcher_shutdown_grace_seconds: u64::MAX,
            dispatcher_force_window_seconds: u64::MAX,
            ..BatchJobConfig::default()
        };
        let tracker = CompletionTracker::from_config(&config).unwrap();
        tracker.record_submission();
        tracker.observe(&PendingResult::succeeded(1u8));

        let outcome = tracker.await_drain_or_timeout(Duration::MAX);

        assert!(outcome.is_drained());
        assert_eq!(tracker.dispatcher_shutdown(), Some(ShutdownOutcome::Graceful));
    }
}
