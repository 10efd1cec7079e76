//! # Batch Job Processor
//!
//! The batch-driving loop: pulls batches from a [`Paginator`](crate::pagination::Paginator),
//! submits every item's asynchronous operation and waits for the drain.
//!
//! ## Phases
//!
//! ```text
//! Idle -> Starting -> { Fetching -> Submitting }* -> Draining -> Done
//! ```
//!
//! An empty source goes from `Fetching` straight to `Done`. A source or
//! submission error also ends in `Done`, with `run` returning the error.
//!
//! ## Usage
//!
//! ```rust
//! use tasker_batch::execution::PendingResult;
//! use tasker_batch::pagination::{BatchSource, Cursor, Paginator};
//! use tasker_batch::processor::BatchJobProcessor;
//! use std::convert::Infallible;
//!
//! struct Ids(Vec<u64>);
//!
//! impl BatchSource for Ids {
//!     type Item = u64;
//!     type Error = Infallible;
//!
//!     fn load_next_batch(
//!         &mut self,
//!         after: &Cursor,
//!         batch_size: usize,
//!     ) -> Result<Vec<u64>, Infallible> {
//!         let after: u64 = after.as_str().parse().unwrap_or(0);
//!         Ok(self.0.iter().copied().filter(|id| *id > after).take(batch_size).collect())
//!     }
//!
//!     fn cursor_of(&self, id: &u64) -> Cursor {
//!         Cursor::new(id.to_string())
//!     }
//! }
//!
//! let source = Paginator::new(Ids(vec![1, 2, 3]), 2);
//! let mut processor = BatchJobProcessor::builder(source, |id: &u64| {
//!     Ok(PendingResult::succeeded(id * 10))
//! })
//! .job_name("docs_job")
//! .build()
//! .unwrap();
//!
//! let report = processor.run().unwrap();
//! assert_eq!(report.submitted, 3);
//! assert_eq!(report.succeeded, 3);
//! ```

mod batch_job;
mod builder;
mod report;

pub use batch_job::BatchJobProcessor;
pub use builder::BatchJobProcessorBuilder;
pub use report::{JobPhase, JobReport};
