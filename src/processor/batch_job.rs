use chrono::Utc;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::builder::BatchJobProcessorBuilder;
use super::report::{JobPhase, JobReport};
use crate::config::BatchJobConfig;
use crate::error::{BatchJobError, BatchResult, BoxDynError};
use crate::execution::{Dispatcher, PendingResult, TaskFailure};
use crate::logging::log_job_operation;
use crate::metrics::BatchMetrics;
use crate::pagination::{BatchSource, Paginator};
use crate::tracking::{CompletionTracker, DrainOutcome};

pub(super) type SubmitFn<T, R> =
    Box<dyn FnMut(&T) -> Result<PendingResult<R>, BoxDynError> + Send + 'static>;
pub(super) type SuccessFn<T, R> = Arc<dyn Fn(T, &R) + Send + Sync + 'static>;
pub(super) type FailureFn<T> = Arc<dyn Fn(T, &TaskFailure) + Send + Sync + 'static>;

/// Drives a paginated source through asynchronous per-item operations
///
/// Each batch is submitted item by item without waiting for any operation to
/// settle. Every resulting [`PendingResult`] gets two independent listeners:
/// the tracker's counting listener and the business listener that records the
/// task metric and calls the caller's continuation. Once the source is drained
/// the run blocks on the tracker's bounded drain wait.
///
/// A processor runs at most once.
pub struct BatchJobProcessor<S: BatchSource, R> {
    paginator: Paginator<S>,
    submit: SubmitFn<S::Item, R>,
    on_success: SuccessFn<S::Item, R>,
    on_failure: FailureFn<S::Item>,
    metrics: Arc<dyn BatchMetrics>,
    config: BatchJobConfig,
    tracker: CompletionTracker,
    continuations: Dispatcher,
    phase: JobPhase,
    has_run: bool,
}

impl<S, R> BatchJobProcessor<S, R>
where
    S: BatchSource,
    S::Item: Send + 'static,
    R: Send + Sync + 'static,
{
    /// Start assembling a processor around `paginator` and `submit`
    ///
    /// `submit` starts the asynchronous operation for one item and returns its
    /// handle. Returning `Err` aborts the run.
    pub fn builder<F>(paginator: Paginator<S>, submit: F) -> BatchJobProcessorBuilder<S, R>
    where
        F: FnMut(&S::Item) -> Result<PendingResult<R>, BoxDynError> + Send + 'static,
    {
        BatchJobProcessorBuilder::new(paginator, submit)
    }

    pub(super) fn assemble(
        paginator: Paginator<S>,
        submit: SubmitFn<S::Item, R>,
        on_success: SuccessFn<S::Item, R>,
        on_failure: FailureFn<S::Item>,
        metrics: Arc<dyn BatchMetrics>,
        config: BatchJobConfig,
    ) -> BatchResult<Self> {
        let tracker = CompletionTracker::from_config(&config)?;
        let continuations = Dispatcher::new(
            format!("{}-continuations", config.job_name),
            config.continuation_worker_count(),
        )?;

        Ok(Self {
            paginator,
            submit,
            on_success,
            on_failure,
            metrics,
            config,
            tracker,
            continuations,
            phase: JobPhase::Idle,
            has_run: false,
        })
    }

    /// Process every batch, wait for the drain and report
    ///
    /// Item failures never fail the run. A source or submission error aborts it;
    /// operations submitted before the abort stay tracked and can still be
    /// drained through [`BatchJobProcessor::tracker`].
    pub fn run(&mut self) -> BatchResult<JobReport> {
        if self.has_run {
            return Err(BatchJobError::AlreadyRun {
                job_name: self.config.job_name.clone(),
            });
        }
        self.has_run = true;

        let run_id = Uuid::new_v4();
        let run_id_str = run_id.to_string();
        let started_at = Utc::now();
        let started = Instant::now();

        self.transition(JobPhase::Starting);
        info!(
            job_name = %self.config.job_name,
            run_id = %run_id,
            batch_size = self.paginator.batch_size(),
            continuation_workers = self.continuations.worker_count(),
            "🚀 Starting batch job"
        );
        log_job_operation("run", &self.config.job_name, Some(&run_id_str), "started", None);
        self.metrics.record_job_start(&self.config.job_name);

        let job_success = Arc::new(AtomicBool::new(true));

        if let Err(e) = self.drive_batches(&job_success) {
            self.transition(JobPhase::Done);
            self.metrics
                .record_job_completion(&self.config.job_name, started.elapsed(), false);
            error!(
                job_name = %self.config.job_name,
                run_id = %run_id,
                error = %e,
                submitted = self.tracker.stats().submitted,
                outstanding = self.tracker.outstanding(),
                "❌ Batch job aborted"
            );
            log_job_operation(
                "run",
                &self.config.job_name,
                Some(&run_id_str),
                "aborted",
                Some(&e.to_string()),
            );
            return Err(e);
        }

        let drain = if self.tracker.stats().submitted == 0 {
            debug!(job_name = %self.config.job_name, "Nothing was submitted, skipping drain");
            DrainOutcome::Drained
        } else {
            self.transition(JobPhase::Draining);
            self.drain()
        };

        self.transition(JobPhase::Done);
        let stats = self.tracker.stats();
        let success = job_success.load(Ordering::Acquire) && stats.failed == 0;
        let elapsed = started.elapsed();
        self.metrics
            .record_job_completion(&self.config.job_name, elapsed, success);

        let report = JobReport::new(
            run_id,
            &self.config.job_name,
            started_at,
            stats,
            elapsed,
            self.paginator.batch_number(),
            drain,
            success,
        );

        info!(
            job_name = %report.job_name,
            run_id = %report.run_id,
            submitted = report.submitted,
            succeeded = report.succeeded,
            failed = report.failed,
            batches = report.batches,
            drained = drain.is_drained(),
            elapsed_seconds = report.elapsed_seconds,
            "✅ Batch job completed"
        );
        log_job_operation(
            "run",
            &self.config.job_name,
            Some(&run_id_str),
            if success { "succeeded" } else { "completed_with_failures" },
            None,
        );

        Ok(report)
    }

    fn drive_batches(&mut self, job_success: &Arc<AtomicBool>) -> BatchResult<()> {
        loop {
            self.transition(JobPhase::Fetching);
            let batch_started = Instant::now();

            let Some(batch) = self.paginator.next_batch()? else {
                return Ok(());
            };

            self.transition(JobPhase::Submitting);
            let batch_number = self.paginator.batch_number();
            let item_count = batch.len();

            for item in batch {
                self.submit_item(item, batch_number, job_success)?;
            }

            let job_name = &self.config.job_name;
            self.metrics
                .record_batch(job_name, batch_number, item_count, batch_started.elapsed());
            self.metrics
                .record_queue_size(job_name, self.tracker.outstanding());
            self.paginator.report_batch("Submitted batch");
        }
    }

    fn submit_item(
        &mut self,
        item: S::Item,
        batch_number: u64,
        job_success: &Arc<AtomicBool>,
    ) -> BatchResult<()> {
        let submitted_at = Instant::now();
        let pending = (self.submit)(&item)
            .map_err(|source| BatchJobError::Submission {
                batch_number,
                source,
            })?;

        // Counted before any listener can observe the settlement
        self.tracker.record_submission();
        self.tracker.observe(&pending);

        let metrics = Arc::clone(&self.metrics);
        let job_name = self.config.job_name.clone();
        let on_success = Arc::clone(&self.on_success);
        let on_failure = Arc::clone(&self.on_failure);
        let job_success = Arc::clone(job_success);

        pending.on_settled(&self.continuations, move |outcome| {
            let duration = submitted_at.elapsed();
            match outcome {
                Ok(value) => {
                    metrics.record_task_success(&job_name, duration);
                    on_success(item, value);
                }
                Err(failure) => {
                    metrics.record_task_failure(&job_name, duration, failure.kind());
                    job_success.store(false, Ordering::Release);
                    on_failure(item, failure);
                }
            }
        });

        self.metrics.record_task_submitted(&self.config.job_name);
        Ok(())
    }

    /// Tracker drain followed by a flush of already dispatched continuations,
    /// both within the same drain budget
    fn drain(&self) -> DrainOutcome {
        let budget = self.config.drain_timeout();
        let started = Instant::now();

        let outcome = self.tracker.await_drain_or_timeout(budget);

        let remaining = budget.saturating_sub(started.elapsed());
        if !self.continuations.wait_idle(remaining) {
            warn!(
                job_name = %self.config.job_name,
                pending = self.continuations.pending(),
                "⏰ Business continuations still running after drain budget elapsed"
            );
        }

        outcome
    }

    fn transition(&mut self, next: JobPhase) {
        debug!(
            job_name = %self.config.job_name,
            from = %self.phase,
            to = %next,
            "Job phase transition"
        );
        self.phase = next;
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    /// Completion tracker of this processor's run
    pub fn tracker(&self) -> &CompletionTracker {
        &self.tracker
    }

    pub fn config(&self) -> &BatchJobConfig {
        &self.config
    }

    pub fn job_name(&self) -> &str {
        &self.config.job_name
    }

    pub fn has_run(&self) -> bool {
        self.has_run
    }
}

impl<S, R> BatchJobProcessor<S, R>
where
    S: BatchSource + Send + 'static,
    S::Item: Send + 'static,
    R: Send + Sync + 'static,
{
    /// Run on tokio's blocking pool so async callers are not stalled by the drain wait
    ///
    /// The processor is consumed. To drain operations submitted before an
    /// abort, clone [`BatchJobProcessor::tracker`] before calling this; the
    /// clone shares the counts and the drain of the consumed processor.
    pub async fn run_async(mut self) -> BatchResult<JobReport> {
        let job_name = self.config.job_name.clone();
        tokio::task::spawn_blocking(move || self.run())
            .await
            .map_err(|e| {
                BatchJobError::Runtime(format!("Batch job '{job_name}' did not complete: {e}"))
            })?
    }
}

impl<S: BatchSource, R> fmt::Debug for BatchJobProcessor<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchJobProcessor")
            .field("job_name", &self.config.job_name)
            .field("phase", &self.phase)
            .field("batch_number", &self.paginator.batch_number())
            .field("tracker", &self.tracker)
            .field("continuations", &self.continuations)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RecordingBatchMetrics;
    use crate::pagination::Cursor;
    use parking_lot::Mutex;
    use std::convert::Infallible;
    use std::time::Duration;

    struct Numbers(u32);

    impl BatchSource for Numbers {
        type Item = u32;
        type Error = Infallible;

        fn load_next_batch(
            &mut self,
            after: &Cursor,
            batch_size: usize,
        ) -> Result<Vec<u32>, Infallible> {
            let start: u32 = after.as_str().parse().unwrap_or(0);
            Ok((start + 1..=self.0).take(batch_size).collect())
        }

        fn cursor_of(&self, item: &u32) -> Cursor {
            Cursor::new(item.to_string())
        }
    }

    fn test_config() -> BatchJobConfig {
        BatchJobConfig {
            job_name: "processor_test".to_string(),
            batch_size: 3,
            drain_timeout_seconds: 5,
            drain_poll_interval_ms: 10,
            dispatcher_shutdown_grace_seconds: 1,
            dispatcher_force_window_seconds: 1,
            continuation_workers: Some(2),
            ..BatchJobConfig::default()
        }
    }

    #[test]
    fn odd_numbers_fail_and_every_item_gets_one_continuation() {
        let config = test_config();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (ok_seen, err_seen) = (Arc::clone(&seen), Arc::clone(&seen));

        let mut processor = BatchJobProcessor::builder(
            Paginator::from_config(Numbers(7), &config),
            |n: &u32| {
                Ok(if n % 2 == 0 {
                    PendingResult::succeeded(*n)
                } else {
                    PendingResult::failed(TaskFailure::new("OddNumber", n.to_string()))
                })
            },
        )
        .config(config)
        .on_success(move |n, _| ok_seen.lock().push((n, true)))
        .on_failure(move |n, _| err_seen.lock().push((n, false)))
        .build()
        .unwrap();

        let report = processor.run().unwrap();

        assert_eq!(report.submitted, 7);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 4);
        assert_eq!(report.batches, 3);
        assert!(report.drain.is_drained());
        assert!(!report.success);
        assert_eq!(processor.phase(), JobPhase::Done);

        let mut seen = seen.lock().clone();
        seen.sort();
        let expected: Vec<_> = (1..=7).map(|n| (n, n % 2 == 0)).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn second_run_is_rejected() {
        let mut processor = BatchJobProcessor::builder(
            Paginator::new(Numbers(1), 1),
            |n: &u32| Ok(PendingResult::succeeded(*n)),
        )
        .config(test_config())
        .build()
        .unwrap();

        assert!(processor.run().unwrap().success);
        assert!(matches!(
            processor.run(),
            Err(BatchJobError::AlreadyRun { .. })
        ));
    }

    #[test]
    fn submission_error_aborts_after_earlier_items_were_tracked() {
        let metrics = Arc::new(RecordingBatchMetrics::new());
        let mut processor = BatchJobProcessor::builder(
            Paginator::new(Numbers(5), 2),
            |n: &u32| -> Result<PendingResult<u32>, BoxDynError> {
                if *n == 3 {
                    return Err("kafka producer closed".into());
                }
                Ok(PendingResult::succeeded(*n))
            },
        )
        .config(test_config())
        .job_name("abort_test")
        .metrics(metrics.clone())
        .build()
        .unwrap();

        let err = processor.run().unwrap_err();
        assert!(matches!(
            err,
            BatchJobError::Submission { batch_number: 2, .. }
        ));

        let outcome = processor
            .tracker()
            .await_drain_or_timeout(Duration::from_secs(5));
        assert!(outcome.is_drained());
        assert_eq!(processor.tracker().stats().submitted, 2);

        let recorded = metrics.snapshot("abort_test").unwrap();
        assert_eq!(recorded.jobs_started, 1);
        assert_eq!(recorded.jobs_failed, 1);
    }

    #[test]
    fn empty_source_skips_drain() {
        let mut processor = BatchJobProcessor::<_, u32>::builder(
            Paginator::new(Numbers(0), 10),
            |n: &u32| Ok(PendingResult::succeeded(*n)),
        )
        .config(test_config())
        .build()
        .unwrap();

        let report = processor.run().unwrap();
        assert_eq!(report.submitted, 0);
        assert_eq!(report.batches, 0);
        assert_eq!(report.success_rate, 0.0);
        assert!(processor.tracker().drain_outcome().is_none());
    }

    #[test]
    fn run_async_drives_the_blocking_loop_off_the_runtime() {
        let processor = BatchJobProcessor::builder(Paginator::new(Numbers(4), 2), |n: &u32| {
            Ok(PendingResult::succeeded(*n))
        })
        .config(test_config())
        .build()
        .unwrap();

        let report = tokio_test::block_on(processor.run_async()).unwrap();
        assert_eq!(report.submitted, 4);
        assert_eq!(report.batches, 2);
    }

    #[test]
    fn cloned_tracker_drains_submissions_after_async_abort() {
        let processor = BatchJobProcessor::builder(
            Paginator::new(Numbers(5), 2),
            |n: &u32| -> Result<PendingResult<u32>, BoxDynError> {
                if *n == 3 {
                    return Err("kafka producer closed".into());
                }
                Ok(PendingResult::succeeded(*n))
            },
        )
        .config(test_config())
        .build()
        .unwrap();
        let tracker = processor.tracker().clone();

        let err = tokio_test::block_on(processor.run_async()).unwrap_err();
        assert!(matches!(err, BatchJobError::Submission { .. }));

        let outcome = tracker.await_drain_or_timeout(Duration::from_secs(5));
        assert!(outcome.is_drained());
        assert_eq!(tracker.stats().submitted, 2);
        assert_eq!(tracker.stats().succeeded, 2);
    }

    #[test]
    fn unbounded_drain_and_shutdown_windows_complete_the_run() {
        let mut processor = BatchJobProcessor::builder(Paginator::new(Numbers(4), 2), |n: &u32| {
            Ok(PendingResult::succeeded(*n))
        })
        .config(BatchJobConfig {
            drain_timeout_seconds: u64::MAX,
            dispatcher_shutdown_grace_seconds: u64::MAX,
            dispatcher_force_window_seconds: u64::MAX,
            ..test_config()
        })
        .build()
        .unwrap();

        let report = processor.run().unwrap();

        assert_eq!(report.submitted, 4);
        assert!(report.drain.is_drained());
        assert_eq!(processor.phase(), JobPhase::Done);
    }

    #[test]
    fn invalid_config_is_rejected_at_build() {
        let result = BatchJobProcessor::builder(Paginator::new(Numbers(1), 1), |n: &u32| {
            Ok(PendingResult::succeeded(*n))
        })
        .config(BatchJobConfig {
            continuation_workers: Some(0),
            ..test_config()
        })
        .build();

        assert!(matches!(result, Err(BatchJobError::Configuration(_))));
    }
}
