//! Handlers for the sync and clear commands.

use anyhow::{Result, bail};
use std::path::Path;

use super::{ConsoleSyncReporter, open_store};
use crate::cli::config::Config;
use crate::cli::{ClearArgs, SyncArgs};
use crate::sync::{BookmarkSource, BookmarkSync, ChromeJsonSource, SyncOptions};

pub fn handle_sync(args: &SyncArgs, data_dir: &Path, config: &Config, verbose: bool) -> Result<()> {
    let Some(file) = config.bookmarks_file(args.file.as_ref()) else {
        bail!("no bookmark file given; pass --file or set bookmarks_file in the config");
    };

    let source = ChromeJsonSource::new(&file);
    if !source.is_available() {
        bail!("bookmark file not found: {}", file.display());
    }

    let store = open_store(data_dir)?;
    let sync = BookmarkSync::new(&store, source);
    let options = SyncOptions {
        force_refresh: args.force,
        batch_size: args.batch_size,
    };

    let mut reporter = ConsoleSyncReporter::new(verbose);
    let written = sync.sync_with_progress(&options, &mut reporter);

    if let Some(error) = reporter.error {
        bail!("sync failed: {error}");
    }
    println!("Synced {} bookmark(s)", written.len());
    Ok(())
}

pub fn handle_clear(args: &ClearArgs, data_dir: &Path) -> Result<()> {
    if !args.yes {
        bail!("this deletes every stored bookmark; pass --yes to confirm");
    }
    let store = open_store(data_dir)?;
    store.clear()?;
    println!("Cleared all bookmarks");
    Ok(())
}
