use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use super::BatchMetrics;

/// Aggregated events for one job name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordedJobMetrics {
    pub jobs_started: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub job_duration_total: Duration,

    pub batches_processed: u64,
    pub items_processed: u64,
    pub last_batch_number: u64,
    pub batch_duration_total: Duration,

    pub tasks_submitted: u64,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    /// Failure count keyed by error type
    pub failures_by_type: HashMap<String, u64>,
    pub task_duration_total: Duration,

    pub last_queue_size: Option<u64>,
}

impl RecordedJobMetrics {
    pub fn tasks_completed(&self) -> u64 {
        self.tasks_succeeded + self.tasks_failed
    }
}

/// In-memory observer keyed by job name
#[derive(Debug, Default)]
pub struct RecordingBatchMetrics {
    jobs: DashMap<String, RecordedJobMetrics>,
}

impl RecordingBatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded for `job_name`
    pub fn snapshot(&self, job_name: &str) -> Option<RecordedJobMetrics> {
        self.jobs.get(job_name).map(|entry| entry.value().clone())
    }

    pub fn job_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.jobs.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    fn update(&self, job_name: &str, apply: impl FnOnce(&mut RecordedJobMetrics)) {
        let mut entry = self.jobs.entry(job_name.to_string()).or_default();
        apply(entry.value_mut());
    }
}

impl BatchMetrics for RecordingBatchMetrics {
    fn record_job_start(&self, job_name: &str) {
        self.update(job_name, |m| m.jobs_started += 1);
    }

    fn record_job_completion(&self, job_name: &str, duration: Duration, success: bool) {
        self.update(job_name, |m| {
            if success {
                m.jobs_succeeded += 1;
            } else {
                m.jobs_failed += 1;
            }
            m.job_duration_total += duration;
        });
    }

    fn record_batch(
        &self,
        job_name: &str,
        batch_number: u64,
        item_count: usize,
        duration: Duration,
    ) {
        self.update(job_name, |m| {
            m.batches_processed += 1;
            m.items_processed += item_count as u64;
            m.last_batch_number = m.last_batch_number.max(batch_number);
            m.batch_duration_total += duration;
        });
    }

    fn record_task_submitted(&self, job_name: &str) {
        self.update(job_name, |m| m.tasks_submitted += 1);
    }

    fn record_task_success(&self, job_name: &str, duration: Duration) {
        self.update(job_name, |m| {
            m.tasks_succeeded += 1;
            m.task_duration_total += duration;
        });
    }

    fn record_task_failure(&self, job_name: &str, duration: Duration, error_type: &str) {
        self.update(job_name, |m| {
            m.tasks_failed += 1;
            *m.failures_by_type.entry(error_type.to_string()).or_insert(0) += 1;
            m.task_duration_total += duration;
        });
    }

    fn record_queue_size(&self, job_name: &str, queue_size: u64) {
        self.update(job_name, |m| m.last_queue_size = Some(queue_size));
    }
}
