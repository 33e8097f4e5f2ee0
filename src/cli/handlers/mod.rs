//! Command handlers for the CLI.

mod bookmarks;
mod list;
mod search;
mod sync;

use anyhow::{Context, Result};
use std::path::Path;

use crate::domain::Bookmark;
use crate::store::{BookmarkStore, StoreConfig};
use crate::sync::{SyncError, SyncReporter};

// Re-export public items
pub use bookmarks::{handle_add, handle_rm, handle_show};
pub use list::{handle_categories, handle_count, handle_list, handle_recent};
pub use search::handle_search;
pub use sync::{handle_clear, handle_sync};

/// Opens the bookmark store under the resolved data directory.
pub(crate) fn open_store(data_dir: &Path) -> Result<BookmarkStore> {
    BookmarkStore::open(data_dir, StoreConfig::default())
        .with_context(|| format!("failed to open bookmark store at {}", data_dir.display()))
}

/// Formats an epoch-milliseconds timestamp as a date for display.
pub(crate) fn format_date(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// One-line human rendering of a bookmark.
pub(crate) fn bookmark_line(bookmark: &Bookmark) -> String {
    let mut line = format!(
        "{}  {}  {}",
        bookmark.id,
        format_date(bookmark.date_added),
        truncate_str(&bookmark.title, 60)
    );
    if let Some(url) = &bookmark.url {
        line.push_str(&format!("  ({url})"));
    }
    line
}

/// Truncates a string to a maximum display width, adding ellipsis if needed.
pub(crate) fn truncate_str(s: &str, max_width: usize) -> String {
    if s.chars().count() <= max_width {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
        format!("{}…", truncated)
    }
}

/// Sync reporter that prints to stdout and remembers a failure.
pub(crate) struct ConsoleSyncReporter {
    verbose: bool,
    pub(crate) error: Option<String>,
}

impl ConsoleSyncReporter {
    pub(crate) fn new(verbose: bool) -> Self {
        Self {
            verbose,
            error: None,
        }
    }
}

impl SyncReporter for ConsoleSyncReporter {
    fn on_batch(&mut self, batch: &[Bookmark]) {
        if self.verbose {
            println!("  wrote batch of {} bookmark(s)", batch.len());
        }
    }

    fn on_progress(&mut self, percent: u8) {
        if self.verbose {
            println!("  {percent}%");
        }
    }

    fn on_error(&mut self, error: &SyncError) {
        self.error = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_strings_alone() {
        assert_eq!(truncate_str("short", 10), "short");
    }

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate_str("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn format_date_renders_epoch_ms() {
        assert_eq!(format_date(0), "1970-01-01");
    }
}
