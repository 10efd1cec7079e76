//! # Cursor Pagination
//!
//! Supplies bounded batches from an external data source without loading the
//! whole dataset. Integrators implement [`BatchSource`]; the [`Paginator`] owns
//! the cursor and stops for good at the first empty batch.
//!
//! ```rust
//! use tasker_batch::pagination::{BatchSource, Cursor, Paginator};
//! use std::convert::Infallible;
//!
//! struct Letters(Vec<String>);
//!
//! impl BatchSource for Letters {
//!     type Item = String;
//!     type Error = Infallible;
//!
//!     fn load_next_batch(
//!         &mut self,
//!         after: &Cursor,
//!         batch_size: usize,
//!     ) -> Result<Vec<String>, Infallible> {
//!         Ok(self.0.iter()
//!             .filter(|item| after.is_initial() || item.as_str() > after.as_str())
//!             .take(batch_size)
//!             .cloned()
//!             .collect())
//!     }
//!
//!     fn cursor_of(&self, item: &String) -> Cursor {
//!         Cursor::from(item.as_str())
//!     }
//! }
//!
//! let source = Letters(vec!["A".into(), "B".into(), "C".into()]);
//! let batches: Vec<_> = Paginator::new(source, 2).map(Result::unwrap).collect();
//! assert_eq!(batches, vec![vec!["A", "B"], vec!["C"]]);
//! ```

mod cursor;
mod paginator;

pub use cursor::Cursor;
pub use paginator::{BatchSource, Paginator};
