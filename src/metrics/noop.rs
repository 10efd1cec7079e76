use std::time::Duration;

use super::BatchMetrics;

/// Discards every event; used when no observer is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpBatchMetrics;

impl BatchMetrics for NoOpBatchMetrics {
    fn record_job_start(&self, _job_name: &str) {}

    fn record_job_completion(&self, _job_name: &str, _duration: Duration, _success: bool) {}

    fn record_batch(
        &self,
        _job_name: &str,
        _batch_number: u64,
        _item_count: usize,
        _duration: Duration,
    ) {
    }

    fn record_task_submitted(&self, _job_name: &str) {}

    fn record_task_success(&self, _job_name: &str, _duration: Duration) {}

    fn record_task_failure(&self, _job_name: &str, _duration: Duration, _error_type: &str) {}
}
