//! Drains 25 in-memory tasks in batches of 5
//!
//! Each task is simulated async work spawned on tokio; every seventh one fails.
//!
//! ```bash
//! cargo run --example simple_job
//! TASKER_BATCH_LOG_FORMAT=json cargo run --example simple_job
//! ```

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use tasker_batch::config::BatchJobConfig;
use tasker_batch::execution::PendingResult;
use tasker_batch::logging::init_structured_logging;
use tasker_batch::metrics::RecordingBatchMetrics;
use tasker_batch::pagination::{BatchSource, Cursor, Paginator};
use tasker_batch::processor::BatchJobProcessor;
use tracing::{error, info};

#[derive(Debug, Clone)]
struct Task {
    id: u32,
    data: String,
}

impl Task {
    fn key(&self) -> String {
        format!("task-{:04}", self.id)
    }
}

struct TaskSource {
    tasks: Vec<Task>,
}

impl BatchSource for TaskSource {
    type Item = Task;
    type Error = Infallible;

    fn load_next_batch(
        &mut self,
        after: &Cursor,
        batch_size: usize,
    ) -> Result<Vec<Task>, Infallible> {
        Ok(self
            .tasks
            .iter()
            .filter(|task| after.is_initial() || task.key().as_str() > after.as_str())
            .take(batch_size)
            .cloned()
            .collect())
    }

    fn cursor_of(&self, task: &Task) -> Cursor {
        Cursor::new(task.key())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("downstream rejected {0}")]
struct DownstreamRejected(String);

async fn process_task(task: Task) -> Result<String, DownstreamRejected> {
    tokio::time::sleep(Duration::from_millis(u64::from(task.id % 4) * 20)).await;
    if task.id % 7 == 0 {
        return Err(DownstreamRejected(task.key()));
    }
    Ok(format!("processed-{}", task.data))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_structured_logging();

    let config = BatchJobConfig {
        job_name: "simple_job".to_string(),
        batch_size: 5,
        drain_timeout_seconds: 30,
        ..BatchJobConfig::default()
    };
    let tasks = (1..=25)
        .map(|id| Task {
            id,
            data: format!("data-{id}"),
        })
        .collect();
    let metrics = Arc::new(RecordingBatchMetrics::new());
    let runtime = tokio::runtime::Handle::current();

    let processor = BatchJobProcessor::builder(
        Paginator::from_config(TaskSource { tasks }, &config),
        move |task: &Task| Ok(PendingResult::spawn(&runtime, process_task(task.clone()))),
    )
    .config(config)
    .metrics(metrics.clone())
    .on_success(|task, result| info!(task = %task.key(), result = %result, "Task processed"))
    .on_failure(|task, failure| error!(task = %task.key(), error = %failure, "Task failed"))
    .build()?;

    let report = processor.run_async().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(recorded) = metrics.snapshot("simple_job") {
        println!(
            "batches={} items={} failures_by_type={:?}",
            recorded.batches_processed, recorded.items_processed, recorded.failures_by_type
        );
    }

    Ok(())
}
