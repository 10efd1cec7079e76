use std::iter::FusedIterator;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::cursor::Cursor;
use crate::config::BatchJobConfig;
use crate::error::{BatchJobError, BatchResult};

/// External data source read page by page
///
/// Implementations must honour the cursor contract: a cursor produced by
/// [`BatchSource::cursor_of`] for the last item of a batch, when passed back to
/// [`BatchSource::load_next_batch`], never yields an item that was already
/// delivered. Once an empty batch is returned the source is considered drained.
pub trait BatchSource {
    type Item;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load at most `batch_size` items positioned strictly after `after`
    fn load_next_batch(
        &mut self,
        after: &Cursor,
        batch_size: usize,
    ) -> Result<Vec<Self::Item>, Self::Error>;

    /// Resume point for the page following `item`
    fn cursor_of(&self, item: &Self::Item) -> Cursor;
}

/// Drives a [`BatchSource`] from the initial cursor until it runs dry
///
/// The paginator is fused: after an empty batch or a source error it never
/// calls the source again.
#[derive(Debug)]
pub struct Paginator<S: BatchSource> {
    source: S,
    batch_size: usize,
    cursor: Cursor,
    batch_number: u64,
    last_batch_len: usize,
    batch_started: Option<Instant>,
    exhausted: bool,
}

impl<S: BatchSource> Paginator<S> {
    /// `batch_size` of zero is treated as one
    pub fn new(source: S, batch_size: usize) -> Self {
        Self {
            source,
            batch_size: batch_size.max(1),
            cursor: Cursor::initial(),
            batch_number: 0,
            last_batch_len: 0,
            batch_started: None,
            exhausted: false,
        }
    }

    /// Paginator using the configured batch size
    pub fn from_config(source: S, config: &BatchJobConfig) -> Self {
        Self::new(source, config.batch_size)
    }

    /// Load the next non-empty batch, or `None` once the source is drained
    pub fn next_batch(&mut self) -> BatchResult<Option<Vec<S::Item>>> {
        if self.exhausted {
            return Ok(None);
        }

        self.batch_started = Some(Instant::now());

        let records = match self.source.load_next_batch(&self.cursor, self.batch_size) {
            Ok(records) => records,
            Err(e) => {
                self.exhausted = true;
                return Err(BatchJobError::Source {
                    batch_number: self.batch_number + 1,
                    source: Box::new(e),
                });
            }
        };

        let Some(last) = records.last() else {
            self.exhausted = true;
            debug!(
                batches = self.batch_number,
                cursor = %self.cursor,
                "Batch source drained"
            );
            return Ok(None);
        };

        if records.len() > self.batch_size {
            warn!(
                requested = self.batch_size,
                returned = records.len(),
                "Batch source returned more records than requested"
            );
        }

        self.cursor = self.source.cursor_of(last);
        self.batch_number += 1;
        self.last_batch_len = records.len();

        Ok(Some(records))
    }

    /// Log timing for the most recent batch
    ///
    /// Advisory only; measures from the start of the load to now.
    pub fn report_batch(&self, prefix: &str) {
        let elapsed = self
            .batch_started
            .map(|started| started.elapsed())
            .unwrap_or(Duration::ZERO);

        debug!(
            batch_number = self.batch_number,
            records = self.last_batch_len,
            duration_seconds = elapsed.as_secs_f64(),
            "{} #{} - {} records in {:.3} sec.",
            prefix,
            self.batch_number,
            self.last_batch_len,
            elapsed.as_secs_f64()
        );
    }

    /// Number of non-empty batches delivered so far
    pub fn batch_number(&self) -> u64 {
        self.batch_number
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

impl<S: BatchSource> Iterator for Paginator<S> {
    type Item = BatchResult<Vec<S::Item>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

impl<S: BatchSource> FusedIterator for Paginator<S> {}
