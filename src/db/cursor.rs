//! Cursor streaming support types.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Iteration direction over a table or index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    pub(super) fn sql(self) -> &'static str {
        match self {
            Direction::Forward => "ASC",
            Direction::Reverse => "DESC",
        }
    }
}

/// What to do with a record visited by a cursor.
///
/// Explicit tagging removes the ambiguity between "no change" and "delete"
/// that a nullable return value would carry.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorAction<T> {
    /// Leave the record untouched.
    Keep,
    /// Overwrite the record in place.
    Replace(T),
    /// Remove the record.
    Delete,
}

/// Cooperative cancellation handle, checked between cursor steps.
///
/// Batches already committed when cancellation is observed stay committed.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Options for [`super::RecordDatabase::process_by_cursor`].
#[derive(Debug, Clone, Default)]
pub struct CursorOptions<'a> {
    /// Iterate in index order instead of primary-key order.
    pub index: Option<&'a str>,
    pub direction: Direction,
    /// Records accumulated before each commit. Zero means the default.
    pub batch_size: usize,
    pub cancel: Option<&'a CancelToken>,
}

/// Outcome of a cursor pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorStats {
    pub processed: usize,
    pub replaced: usize,
    pub deleted: usize,
    /// True when the pass stopped early due to cancellation.
    pub cancelled: bool,
}
