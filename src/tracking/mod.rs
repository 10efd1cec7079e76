//! # Completion Tracking
//!
//! Knows when every submitted operation has settled, even though submission and
//! completion are decoupled and completions arrive in any order on any thread.

mod stats;
mod tracker;

pub use stats::{JobStats, JobStatsSnapshot};
pub use tracker::{CompletionTracker, DrainOutcome};
