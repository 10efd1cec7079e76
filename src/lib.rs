#![allow(clippy::doc_markdown)] // Allow technical terms like OpenTelemetry in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Batch
//!
//! Engine for draining a large, paginated data source through asynchronous
//! per-item work, with completion tracking and a bounded graceful-shutdown wait.
//!
//! ## Overview
//!
//! Typical jobs are dead-letter-queue retries, bulk recomputation and
//! notification fan-out: the item count may exceed memory, and each item's
//! processing is an async operation that completes independently of the others.
//! No submitted operation is silently dropped and nothing is double counted.
//!
//! ## Architecture
//!
//! ```text
//! Paginator -> BatchJobProcessor -> submit(item) -> PendingResult
//!                                                    |-> CompletionTracker (counting, own worker)
//!                                                    `-> on_success / on_failure (continuation pool)
//! ```
//!
//! After the source is exhausted the processor blocks on the tracker's bounded
//! drain wait, then reports the job complete.
//!
//! ## Module Organization
//!
//! - [`pagination`] - Cursor-based batch source abstraction
//! - [`processor`] - Batch-driving loop and run report
//! - [`tracking`] - Submitted versus settled counting and drain wait
//! - [`execution`] - Single-settlement handles and listener dispatchers
//! - [`metrics`] - Lifecycle observers (no-op, in-memory, OpenTelemetry)
//! - [`config`] - Layered job configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tasker_batch::config::BatchJobConfig;
//! use tasker_batch::execution::PendingResult;
//! use tasker_batch::pagination::{BatchSource, Cursor, Paginator};
//! use tasker_batch::processor::BatchJobProcessor;
//! # use std::convert::Infallible;
//! # struct DeadLetters;
//! # impl BatchSource for DeadLetters {
//! #     type Item = String;
//! #     type Error = Infallible;
//! #     fn load_next_batch(&mut self, _: &Cursor, _: usize) -> Result<Vec<String>, Infallible> {
//! #         Ok(vec![])
//! #     }
//! #     fn cursor_of(&self, item: &String) -> Cursor { Cursor::from(item.as_str()) }
//! # }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! tasker_batch::logging::init_structured_logging();
//! let config = BatchJobConfig::load(None)?;
//!
//! let mut processor = BatchJobProcessor::builder(
//!     Paginator::from_config(DeadLetters, &config),
//!     |message: &String| Ok(PendingResult::succeeded(message.len())),
//! )
//! .config(config)
//! .on_failure(|message, failure| eprintln!("retry of {message} failed: {failure}"))
//! .build()?;
//!
//! let report = processor.run()?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod metrics;
pub mod pagination;
pub mod processor;
pub mod tracking;

pub use config::BatchJobConfig;
pub use error::{BatchJobError, BatchResult, BoxDynError};
pub use execution::{Completer, Dispatcher, PendingResult, TaskFailure, TaskOutcome};
pub use metrics::{BatchMetrics, NoOpBatchMetrics, OtelBatchMetrics, RecordingBatchMetrics};
pub use pagination::{BatchSource, Cursor, Paginator};
pub use processor::{BatchJobProcessor, JobReport};
pub use tracking::{CompletionTracker, DrainOutcome, JobStats};
