//! # Structured Logging Module
//!
//! Environment-aware structured logging for batch job runs.
//!
//! The level comes from `RUST_LOG` when set, otherwise from the deployment
//! environment (`TASKER_BATCH_ENV`, `TASKER_ENV` or `APP_ENV`): `info` in
//! production, `debug` everywhere else. Console output is human readable unless
//! `TASKER_BATCH_LOG_FORMAT=json`.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// Safe to call repeatedly; an already installed global subscriber is kept.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json = use_json_format();

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(json.then(|| {
                fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .json()
            }))
            .with((!json).then(|| {
                fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_ansi(true)
            }));

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json = json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn get_environment() -> String {
    std::env::var("TASKER_BATCH_ENV")
        .or_else(|_| std::env::var("TASKER_ENV"))
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

fn use_json_format() -> bool {
    std::env::var("TASKER_BATCH_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log structured data for job lifecycle operations
pub fn log_job_operation(
    operation: &str,
    job_name: &str,
    run_id: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        job_name = %job_name,
        run_id = run_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 JOB_OPERATION"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_logs_at_info() {
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("staging"), "debug");
    }

    #[test]
    fn repeated_initialization_is_harmless() {
        init_structured_logging();
        init_structured_logging();
        log_job_operation("run", "logging_test", None, "started", Some("unit test"));
    }
}
