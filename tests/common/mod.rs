//! Shared fakes for integration tests

#![allow(dead_code)]

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tasker_batch::config::BatchJobConfig;
use tasker_batch::pagination::{BatchSource, Cursor};

/// In-memory source that resumes after the position of the cursor item
///
/// Items must be distinct. Every call to `load_next_batch` is counted.
#[derive(Debug, Clone)]
pub struct VecSource<T> {
    items: Vec<T>,
    loads: Arc<AtomicUsize>,
}

impl<T> VecSource<T>
where
    T: Clone + PartialEq + ToString,
{
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: items.into_iter().collect(),
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared load counter, readable after the source moved into a paginator
    pub fn load_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.loads)
    }

    fn position_after(&self, cursor: &Cursor) -> usize {
        if cursor.is_initial() {
            return 0;
        }
        self.items
            .iter()
            .position(|item| item.to_string() == cursor.as_str())
            .map(|index| index + 1)
            .unwrap_or(self.items.len())
    }
}

impl<T> BatchSource for VecSource<T>
where
    T: Clone + PartialEq + ToString,
{
    type Item = T;
    type Error = Infallible;

    fn load_next_batch(&mut self, after: &Cursor, batch_size: usize) -> Result<Vec<T>, Infallible> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let start = self.position_after(after);
        Ok(self.items.iter().skip(start).take(batch_size).cloned().collect())
    }

    fn cursor_of(&self, item: &T) -> Cursor {
        Cursor::new(item.to_string())
    }
}

pub fn letters() -> VecSource<String> {
    VecSource::new(["A", "B", "C", "D", "E"].map(String::from))
}

/// Short timeouts and a single FIFO continuation worker
pub fn test_config(job_name: &str, batch_size: usize) -> BatchJobConfig {
    BatchJobConfig {
        job_name: job_name.to_string(),
        batch_size,
        drain_timeout_seconds: 10,
        drain_poll_interval_ms: 10,
        dispatcher_shutdown_grace_seconds: 2,
        dispatcher_force_window_seconds: 1,
        continuation_workers: Some(1),
        ..BatchJobConfig::default()
    }
}
