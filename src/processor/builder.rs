use std::sync::Arc;

use super::batch_job::{BatchJobProcessor, FailureFn, SubmitFn, SuccessFn};
use crate::config::BatchJobConfig;
use crate::error::{BatchResult, BoxDynError};
use crate::execution::{PendingResult, TaskFailure};
use crate::metrics::{BatchMetrics, NoOpBatchMetrics};
use crate::pagination::{BatchSource, Paginator};

/// Assembles a [`BatchJobProcessor`]
///
/// Continuations default to no-ops, metrics to [`NoOpBatchMetrics`] and the
/// configuration to [`BatchJobConfig::default`]. A name set with
/// [`BatchJobProcessorBuilder::job_name`] wins over the configured one.
pub struct BatchJobProcessorBuilder<S: BatchSource, R> {
    paginator: Paginator<S>,
    submit: SubmitFn<S::Item, R>,
    on_success: SuccessFn<S::Item, R>,
    on_failure: FailureFn<S::Item>,
    metrics: Arc<dyn BatchMetrics>,
    config: BatchJobConfig,
    job_name: Option<String>,
}

impl<S, R> BatchJobProcessorBuilder<S, R>
where
    S: BatchSource,
    S::Item: Send + 'static,
    R: Send + Sync + 'static,
{
    pub(super) fn new<F>(paginator: Paginator<S>, submit: F) -> Self
    where
        F: FnMut(&S::Item) -> Result<PendingResult<R>, BoxDynError> + Send + 'static,
    {
        Self {
            paginator,
            submit: Box::new(submit),
            on_success: Arc::new(ignore_success::<S::Item, R>),
            on_failure: Arc::new(ignore_failure::<S::Item>),
            metrics: Arc::new(NoOpBatchMetrics),
            config: BatchJobConfig::default(),
            job_name: None,
        }
    }

    /// Runs on the continuation pool for every item whose operation succeeded
    pub fn on_success<F>(mut self, on_success: F) -> Self
    where
        F: Fn(S::Item, &R) + Send + Sync + 'static,
    {
        self.on_success = Arc::new(on_success);
        self
    }

    /// Runs on the continuation pool for every item whose operation failed
    pub fn on_failure<F>(mut self, on_failure: F) -> Self
    where
        F: Fn(S::Item, &TaskFailure) + Send + Sync + 'static,
    {
        self.on_failure = Arc::new(on_failure);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn BatchMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn job_name(mut self, job_name: impl Into<String>) -> Self {
        self.job_name = Some(job_name.into());
        self
    }

    pub fn config(mut self, config: BatchJobConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration and start the job's dispatchers
    pub fn build(self) -> BatchResult<BatchJobProcessor<S, R>> {
        let mut config = self.config;
        if let Some(job_name) = self.job_name {
            config.job_name = job_name;
        }
        config.validate()?;

        BatchJobProcessor::assemble(
            self.paginator,
            self.submit,
            self.on_success,
            self.on_failure,
            self.metrics,
            config,
        )
    }
}

fn ignore_success<T, R>(_item: T, _value: &R) {}

fn ignore_failure<T>(_item: T, _failure: &TaskFailure) {}
