//! # Batch Job Configuration
//!
//! Layered configuration for batch jobs: built-in defaults, then an optional
//! TOML/YAML/JSON file, then `TASKER_BATCH__*` environment overrides.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasker_batch::config::BatchJobConfig;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BatchJobConfig::load(Some(Path::new("config/batch-job.toml")))?;
//! let timeout = config.drain_timeout();
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Prefix for environment overrides, e.g. `TASKER_BATCH__BATCH_SIZE=500`
pub const ENV_PREFIX: &str = "TASKER_BATCH";

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigurationError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;

/// Settings for a single batch job run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchJobConfig {
    /// Tag attached to every log record and metric of the job
    pub job_name: String,
    /// Maximum number of items requested from the source per batch
    pub batch_size: usize,
    /// Hard ceiling for the post-loop drain wait
    pub drain_timeout_seconds: u64,
    /// Re-check interval of the drain wait
    pub drain_poll_interval_ms: u64,
    /// Orderly shutdown window for the completion-counting dispatcher
    pub dispatcher_shutdown_grace_seconds: u64,
    /// Window granted after forced cancellation before workers are abandoned
    pub dispatcher_force_window_seconds: u64,
    /// Business continuation workers; `None` means available parallelism + 1
    #[serde(default)]
    pub continuation_workers: Option<usize>,
    /// Metric name prefix used by the OpenTelemetry exporter
    pub metrics_prefix: String,
}

impl Default for BatchJobConfig {
    fn default() -> Self {
        Self {
            job_name: "batch_job".to_string(),
            batch_size: 10_000,
            drain_timeout_seconds: 30 * 60,
            drain_poll_interval_ms: 100,
            dispatcher_shutdown_grace_seconds: 60,
            dispatcher_force_window_seconds: 60,
            continuation_workers: None,
            metrics_prefix: "tasker_batch".to_string(),
        }
    }
}

impl BatchJobConfig {
    /// Load configuration from defaults, an optional file and the process environment
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        Self::load_with_env(path, None)
    }

    /// Load configuration with an explicit environment map instead of the process environment
    ///
    /// Keys use the same form as real variables (`TASKER_BATCH__BATCH_SIZE`), which keeps
    /// tests independent of global state.
    pub fn load_with_env(
        path: Option<&Path>,
        env_overrides: Option<HashMap<String, String>>,
    ) -> ConfigResult<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("job_name", defaults.job_name.clone())?
            .set_default("batch_size", defaults.batch_size as i64)?
            .set_default("drain_timeout_seconds", defaults.drain_timeout_seconds as i64)?
            .set_default(
                "drain_poll_interval_ms",
                defaults.drain_poll_interval_ms as i64,
            )?
            .set_default(
                "dispatcher_shutdown_grace_seconds",
                defaults.dispatcher_shutdown_grace_seconds as i64,
            )?
            .set_default(
                "dispatcher_force_window_seconds",
                defaults.dispatcher_force_window_seconds as i64,
            )?
            .set_default("metrics_prefix", defaults.metrics_prefix.clone())?;

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading batch job configuration file");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(env_overrides),
        );

        let config: BatchJobConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            "Batch job configuration loaded: {}",
            serde_json::to_string(&config).unwrap_or_else(|_| "[serialization error]".to_string())
        );

        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.job_name.trim().is_empty() {
            return Err(ConfigurationError::invalid("job_name", "must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(ConfigurationError::invalid(
                "batch_size",
                "must be greater than zero",
            ));
        }
        if self.drain_poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid(
                "drain_poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.continuation_workers == Some(0) {
            return Err(ConfigurationError::invalid(
                "continuation_workers",
                "must be at least one worker when set",
            ));
        }
        Ok(())
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_seconds)
    }

    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms)
    }

    pub fn dispatcher_shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.dispatcher_shutdown_grace_seconds)
    }

    pub fn dispatcher_force_window(&self) -> Duration {
        Duration::from_secs(self.dispatcher_force_window_seconds)
    }

    /// Number of business continuation workers this job will start
    pub fn continuation_worker_count(&self) -> usize {
        self.continuation_workers
            .unwrap_or_else(crate::execution::default_continuation_workers)
    }
}
