//! # Batch Job Metrics
//!
//! Passive observer interface for job, batch and task lifecycle events.
//!
//! The processor always talks to a [`BatchMetrics`] implementation; when nothing
//! is configured it uses [`NoOpBatchMetrics`], so "metrics disabled" never needs
//! special handling in the driving loop. Which observer to use is decided by the
//! integrator when assembling the job:
//!
//! - [`NoOpBatchMetrics`]: discards everything (default)
//! - [`RecordingBatchMetrics`]: in-memory per-job counters, handy for tests and
//!   embedding in status endpoints
//! - [`OtelBatchMetrics`]: OpenTelemetry counters, histograms and a queue gauge
//!   registered on a meter; exporter wiring stays with the application
//!
//! All methods are fire-and-forget and must not panic.

mod noop;
mod otel;
mod recording;

use std::sync::Arc;
use std::time::Duration;

use crate::config::BatchJobConfig;

pub use noop::NoOpBatchMetrics;
pub use otel::OtelBatchMetrics;
pub use recording::{RecordedJobMetrics, RecordingBatchMetrics};

/// Observer of batch job lifecycle events
pub trait BatchMetrics: Send + Sync {
    /// A job run started
    fn record_job_start(&self, job_name: &str);

    /// A job run finished; `success` is false if any task failed or the run aborted
    fn record_job_completion(&self, job_name: &str, duration: Duration, success: bool);

    /// A batch was fully submitted (not settled)
    fn record_batch(
        &self,
        job_name: &str,
        batch_number: u64,
        item_count: usize,
        duration: Duration,
    );

    fn record_task_submitted(&self, job_name: &str);

    /// `duration` runs from just before submission to settlement
    fn record_task_success(&self, job_name: &str, duration: Duration);

    fn record_task_failure(&self, job_name: &str, duration: Duration, error_type: &str);

    /// Advisory sample of operations still in flight
    fn record_queue_size(&self, _job_name: &str, _queue_size: u64) {}
}

/// Pick the observer for a job at assembly time
pub fn from_config(config: &BatchJobConfig, enabled: bool) -> Arc<dyn BatchMetrics> {
    if enabled {
        Arc::new(OtelBatchMetrics::from_global(&config.metrics_prefix))
    } else {
        Arc::new(NoOpBatchMetrics)
    }
}
