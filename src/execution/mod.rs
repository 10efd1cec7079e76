//! # Execution Primitives
//!
//! Building blocks shared by the completion tracker and the batch processor:
//!
//! - [`Dispatcher`]: named worker pool that runs settlement listeners off the
//!   thread that settled the operation
//! - [`PendingResult`]: single-settlement handle to an in-flight operation that
//!   supports any number of independently owned listeners
//! - [`TaskFailure`]: failure cause carried by a settled operation
//!
//! The tracker's counting listener and the processor's business listener are two
//! registrations on the same [`PendingResult`]. Neither knows about the other; the
//! handle's single-settlement guarantee is the only thing composing them.

pub mod dispatcher;
pub mod pending;

pub use dispatcher::{DispatchTicket, Dispatcher, ShutdownOutcome};
pub use pending::{Completer, PendingResult, TaskFailure, TaskOutcome};

/// Business continuation pool size: available parallelism plus one
pub fn default_continuation_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        + 1
}
