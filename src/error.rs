use crate::config::ConfigurationError;

/// Boxed error type used for failures raised by integrator code (sources, submit functions)
pub type BoxDynError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that abort a batch job run
///
/// Individual item failures never surface here: they are counted by the
/// completion tracker and routed to the failure continuation instead.
#[derive(Debug, thiserror::Error)]
pub enum BatchJobError {
    /// The batch source failed while loading a page
    #[error("Batch source failed while loading batch #{batch_number}: {source}")]
    Source {
        batch_number: u64,
        #[source]
        source: BoxDynError,
    },

    /// The submit function failed before returning a pending result
    #[error("Submission failed in batch #{batch_number}: {source}")]
    Submission {
        batch_number: u64,
        #[source]
        source: BoxDynError,
    },

    /// A processor instance only runs once
    #[error("Batch job '{job_name}' has already run")]
    AlreadyRun { job_name: String },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The blocking run could not be driven to completion by the async runtime
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl BatchJobError {
    /// Whether this error came from integrator code rather than the engine itself
    pub fn is_integration_failure(&self) -> bool {
        matches!(
            self,
            BatchJobError::Source { .. } | BatchJobError::Submission { .. }
        )
    }
}

pub type BatchResult<T> = std::result::Result<T, BatchJobError>;
