//! OpenTelemetry-backed [`BatchMetrics`]
//!
//! Instruments (all tagged with `job_name`):
//!
//! - `{prefix}_jobs_started_total`
//! - `{prefix}_jobs_completed_total` (`result`: success, failure)
//! - `{prefix}_job_duration_seconds`
//! - `{prefix}_batches_processed_total` (`batch_number`)
//! - `{prefix}_items_processed_total`
//! - `{prefix}_batch_duration_seconds`
//! - `{prefix}_tasks_submitted_total`
//! - `{prefix}_tasks_completed_total` (`result`, `error_type` on failure)
//! - `{prefix}_task_duration_seconds`
//! - `{prefix}_queue_size`

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::KeyValue;
use std::fmt;
use std::time::Duration;

use super::BatchMetrics;

const METER_NAME: &str = "tasker-batch";

pub struct OtelBatchMetrics {
    jobs_started: Counter<u64>,
    jobs_completed: Counter<u64>,
    job_duration: Histogram<f64>,
    batches_processed: Counter<u64>,
    items_processed: Counter<u64>,
    batch_duration: Histogram<f64>,
    tasks_submitted: Counter<u64>,
    tasks_completed: Counter<u64>,
    task_duration: Histogram<f64>,
    queue_size: Gauge<u64>,
}

impl OtelBatchMetrics {
    /// Register instruments on the global meter provider
    pub fn from_global(prefix: &str) -> Self {
        let meter = opentelemetry::global::meter(METER_NAME);
        Self::new(&meter, prefix)
    }

    pub fn new(meter: &Meter, prefix: &str) -> Self {
        Self {
            jobs_started: meter
                .u64_counter(format!("{prefix}_jobs_started_total"))
                .with_description("Total number of batch jobs started")
                .build(),
            jobs_completed: meter
                .u64_counter(format!("{prefix}_jobs_completed_total"))
                .with_description("Total number of batch jobs completed")
                .build(),
            job_duration: meter
                .f64_histogram(format!("{prefix}_job_duration_seconds"))
                .with_description("Time taken to complete batch jobs")
                .with_unit("s")
                .build(),
            batches_processed: meter
                .u64_counter(format!("{prefix}_batches_processed_total"))
                .with_description("Total number of batches processed")
                .build(),
            items_processed: meter
                .u64_counter(format!("{prefix}_items_processed_total"))
                .with_description("Total number of items processed across all batches")
                .build(),
            batch_duration: meter
                .f64_histogram(format!("{prefix}_batch_duration_seconds"))
                .with_description("Time taken to submit individual batches")
                .with_unit("s")
                .build(),
            tasks_submitted: meter
                .u64_counter(format!("{prefix}_tasks_submitted_total"))
                .with_description("Total number of tasks submitted for processing")
                .build(),
            tasks_completed: meter
                .u64_counter(format!("{prefix}_tasks_completed_total"))
                .with_description("Total number of tasks completed")
                .build(),
            task_duration: meter
                .f64_histogram(format!("{prefix}_task_duration_seconds"))
                .with_description("Time taken to complete individual tasks")
                .with_unit("s")
                .build(),
            queue_size: meter
                .u64_gauge(format!("{prefix}_queue_size"))
                .with_description("Tasks submitted but not yet settled")
                .build(),
        }
    }
}

fn job_tag(job_name: &str) -> KeyValue {
    KeyValue::new("job_name", job_name.to_string())
}

impl BatchMetrics for OtelBatchMetrics {
    fn record_job_start(&self, job_name: &str) {
        self.jobs_started.add(1, &[job_tag(job_name)]);
    }

    fn record_job_completion(&self, job_name: &str, duration: Duration, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.jobs_completed
            .add(1, &[job_tag(job_name), KeyValue::new("result", result)]);
        self.job_duration
            .record(duration.as_secs_f64(), &[job_tag(job_name)]);
    }

    fn record_batch(
        &self,
        job_name: &str,
        batch_number: u64,
        item_count: usize,
        duration: Duration,
    ) {
        self.batches_processed.add(
            1,
            &[
                job_tag(job_name),
                KeyValue::new("batch_number", batch_number.to_string()),
            ],
        );
        self.items_processed
            .add(item_count as u64, &[job_tag(job_name)]);
        self.batch_duration
            .record(duration.as_secs_f64(), &[job_tag(job_name)]);
    }

    fn record_task_submitted(&self, job_name: &str) {
        self.tasks_submitted.add(1, &[job_tag(job_name)]);
    }

    fn record_task_success(&self, job_name: &str, duration: Duration) {
        self.tasks_completed
            .add(1, &[job_tag(job_name), KeyValue::new("result", "success")]);
        self.task_duration
            .record(duration.as_secs_f64(), &[job_tag(job_name)]);
    }

    fn record_task_failure(&self, job_name: &str, duration: Duration, error_type: &str) {
        self.tasks_completed.add(
            1,
            &[
                job_tag(job_name),
                KeyValue::new("result", "failure"),
                KeyValue::new("error_type", error_type.to_string()),
            ],
        );
        self.task_duration
            .record(duration.as_secs_f64(), &[job_tag(job_name)]);
    }

    fn record_queue_size(&self, job_name: &str, queue_size: u64) {
        self.queue_size.record(queue_size, &[job_tag(job_name)]);
    }
}

impl fmt::Debug for OtelBatchMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtelBatchMetrics").finish_non_exhaustive()
    }
}
