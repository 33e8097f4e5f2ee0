//! Reconciles the bookmark store against a native bookmark source.
//!
//! The source only knows id/title/url/dateAdded/parentId. Category, tags,
//! content, and metadata are user enrichment that lives solely in the store,
//! so every re-sync carries those fields forward from the existing record —
//! a naive overwrite would silently erase them.

mod chrome_json;

pub use chrome_json::ChromeJsonSource;

use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

use crate::domain::{Bookmark, TreeNode};
use crate::infra::now_ms;
use crate::store::{BookmarkStore, StoreError};

/// Errors from a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The source failed to produce its bookmark tree.
    #[error("bookmark source error: {0}")]
    Source(String),
    #[error("failed to read bookmark file {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse bookmark file {path}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// A native bookmark provider: the full tree plus a flat recent listing
/// used as a degraded substitute when tree traversal fails.
pub trait BookmarkSource {
    /// Whether the source can be reached at all in this runtime.
    fn is_available(&self) -> bool;
    /// The complete bookmark tree, roots first.
    fn tree(&self) -> SyncResult<Vec<TreeNode>>;
    /// The `n` most recently added bookmarks as flat leaf nodes.
    fn recent(&self, n: usize) -> SyncResult<Vec<TreeNode>>;
}

/// Receives progress updates during a sync run.
pub trait SyncReporter {
    /// Called after each batch is persisted.
    fn on_batch(&mut self, batch: &[Bookmark]);
    /// Called after each batch with the overall completion percentage.
    fn on_progress(&mut self, percent: u8);
    /// Called once when the run fails.
    fn on_error(&mut self, error: &SyncError);
}

/// A no-op sync reporter.
#[derive(Default)]
pub struct NoopReporter;

impl SyncReporter for NoopReporter {
    fn on_batch(&mut self, _batch: &[Bookmark]) {}
    fn on_progress(&mut self, _percent: u8) {}
    fn on_error(&mut self, _error: &SyncError) {}
}

/// Options for a sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Drop all stored bookmarks first and re-ingest from scratch. Skips
    /// the carry-forward lookup since there is nothing to carry.
    pub force_refresh: bool,
    /// Nodes persisted per batch; each batch commits before the next
    /// begins.
    pub batch_size: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            force_refresh: false,
            batch_size: 100,
        }
    }
}

/// How many flat nodes to request when tree traversal fails.
const RECENT_FALLBACK_COUNT: usize = 100;

/// Pulls bookmarks from a [`BookmarkSource`] and pushes them into a
/// [`BookmarkStore`] in batches.
pub struct BookmarkSync<'a, S: BookmarkSource> {
    store: &'a BookmarkStore,
    source: S,
}

impl<'a, S: BookmarkSource> BookmarkSync<'a, S> {
    pub fn new(store: &'a BookmarkStore, source: S) -> Self {
        Self { store, source }
    }

    /// Runs a sync and returns every bookmark written.
    ///
    /// An unavailable source is a no-op: the store's current contents come
    /// back unchanged. A failed run is reported through the reporter and
    /// returns an empty list rather than a partial one presented as
    /// complete — callers must treat empty distinctly from "no bookmarks
    /// exist".
    pub fn sync(&self, options: &SyncOptions) -> Vec<Bookmark> {
        self.sync_with_progress(options, &mut NoopReporter)
    }

    /// Runs a sync with progress reporting.
    pub fn sync_with_progress<P: SyncReporter>(
        &self,
        options: &SyncOptions,
        progress: &mut P,
    ) -> Vec<Bookmark> {
        if !self.source.is_available() {
            return self.store.get_all_bookmarks(None, 0);
        }
        match self.run(options, progress) {
            Ok(written) => written,
            Err(e) => {
                warn!(error = %e, "bookmark sync failed");
                progress.on_error(&e);
                Vec::new()
            }
        }
    }

    fn run<P: SyncReporter>(
        &self,
        options: &SyncOptions,
        progress: &mut P,
    ) -> SyncResult<Vec<Bookmark>> {
        if options.force_refresh {
            self.store.clear()?;
        }

        let nodes = self.fetch_flat_nodes()?;
        let total = nodes.len();
        let batch_size = options.batch_size.max(1);

        let mut written = Vec::with_capacity(total);
        let mut processed = 0;

        for chunk in nodes.chunks(batch_size) {
            let mut batch = Vec::with_capacity(chunk.len());
            for node in chunk {
                match self.merge_node(node, options.force_refresh) {
                    Some(bookmark) => batch.push(bookmark),
                    None => {
                        warn!(id = %node.id, "skipping node without id or title");
                    }
                }
            }

            // Each batch commits before the next begins, so observers see
            // a monotonically growing view.
            let persisted = self.store.add_bookmarks(batch)?;
            processed += chunk.len();
            progress.on_batch(&persisted);
            progress.on_progress(percent(processed, total));
            written.extend(persisted);
        }

        Ok(written)
    }

    /// Fetches the tree and flattens it; on traversal failure falls back
    /// to the source's flat recent listing before giving up.
    fn fetch_flat_nodes(&self) -> SyncResult<Vec<TreeNode>> {
        match self.source.tree() {
            Ok(roots) => {
                let mut flat = Vec::new();
                for root in &roots {
                    flatten_into(root, &mut flat);
                }
                Ok(flat)
            }
            Err(e) => {
                warn!(error = %e, "tree traversal failed, falling back to recent listing");
                let recent = self.source.recent(RECENT_FALLBACK_COUNT)?;
                Ok(recent.into_iter().filter(|n| n.url.is_some()).collect())
            }
        }
    }

    /// Builds the merged record for one native node, carrying forward the
    /// stored record's enrichment fields. `None` when the node is missing
    /// its id or title.
    fn merge_node(&self, node: &TreeNode, force_refresh: bool) -> Option<Bookmark> {
        if node.id.is_empty() || node.title.is_empty() {
            return None;
        }

        let existing = if force_refresh {
            None
        } else {
            self.store.get_bookmark(&node.id)
        };

        let date_added = node
            .date_added
            .or(existing.as_ref().map(|e| e.date_added))
            .unwrap_or_else(now_ms);

        let (category, tags, content, metadata) = match existing {
            Some(e) => (e.category, e.tags, e.content, e.metadata),
            None => (None, None, None, serde_json::Map::new()),
        };

        Some(Bookmark {
            id: node.id.clone(),
            title: node.title.clone(),
            url: node.url.clone(),
            date_added,
            parent_id: node.parent_id.clone(),
            category,
            tags,
            content,
            metadata,
        })
    }
}

/// Depth-first collection of url-bearing nodes. Folders are excluded from
/// the flat list, though their ids still appear as `parentId` values.
fn flatten_into(node: &TreeNode, out: &mut Vec<TreeNode>) {
    if node.url.is_some() {
        let mut leaf = node.clone();
        leaf.children = Vec::new();
        out.push(leaf);
    }
    for child in &node.children {
        flatten_into(child, out);
    }
}

fn percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        100
    } else {
        ((processed * 100) / total).min(100) as u8
    }
}
