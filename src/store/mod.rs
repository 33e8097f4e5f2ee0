//! The bookmark store façade: owns the `bookmarks` and `bookmark_index`
//! tables, the recency cache, the search-result cache, and the category
//! registry.
//!
//! Failure policy: the write path propagates errors (a silently lost edit
//! is unacceptable), the read path degrades to empty results after
//! logging.

mod cache;
mod index_entry;
mod search;

pub use index_entry::{BookmarkIndexEntry, build_index_entry};
pub use search::{SearchQuery, SortBy, SortOrder};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::db::{
    DbError, Direction, IndexDef, QueryOptions, RecordDatabase, Schema, TableDef,
};
use crate::domain::{Bookmark, Category};
use crate::infra::now_ms;
use crate::kv::{KeyValueStore, KvOptions};
use cache::{RecencyCache, SearchCache};

/// Table layout, stable across the store's lifetime.
const STORE_SCHEMA: Schema = Schema {
    tables: &[
        TableDef {
            name: "bookmarks",
            key_path: "id",
            indices: &[
                IndexDef::new("dateAdded", "dateAdded"),
                IndexDef::new("category", "category"),
                IndexDef::new("parentId", "parentId"),
                IndexDef::multi("tags", "tags"),
            ],
        },
        TableDef {
            name: "bookmark_index",
            key_path: "id",
            indices: &[
                IndexDef::new("dateAdded", "dateAdded"),
                IndexDef::new("category", "category"),
            ],
        },
        TableDef {
            name: "categories",
            key_path: "id",
            indices: &[],
        },
        TableDef {
            name: "bookmark_metadata",
            key_path: "id",
            indices: &[],
        },
    ],
};

const BOOKMARKS: &str = "bookmarks";
const BOOKMARK_INDEX: &str = "bookmark_index";
const CATEGORIES: &str = "categories";
const METADATA: &str = "bookmark_metadata";

const MIGRATION_MARKER: &str = "migration_completed";
/// Key the pre-database format kept its flat bookmark array under.
const LEGACY_BOOKMARKS_KEY: &str = "chromarx_bookmarks";

/// Errors from bookmark store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store tuning knobs.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Recency cache capacity; also how many records are preloaded.
    pub recency_capacity: usize,
    pub search_cache_ttl: Duration,
    /// Chunk size for bulk writes.
    pub chunk_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            recency_capacity: 500,
            search_cache_ttl: Duration::from_secs(5 * 60),
            chunk_size: 200,
        }
    }
}

/// Migration/meta marker rows in `bookmark_metadata`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaMarker {
    id: String,
    completed_at: i64,
}

/// Local bookmark store over a [`RecordDatabase`] and a [`KeyValueStore`].
///
/// Construct one per data directory and inject it where needed; there is no
/// process-wide instance.
pub struct BookmarkStore {
    db: RecordDatabase,
    kv: KeyValueStore,
    recency: RecencyCache,
    search_cache: SearchCache,
    categories: Mutex<BTreeSet<String>>,
    initialized: Mutex<bool>,
    chunk_size: usize,
}

impl BookmarkStore {
    /// Opens the store under `dir` (`chromarx.db` plus the key/value area
    /// files).
    pub fn open(dir: &Path, config: StoreConfig) -> StoreResult<Self> {
        Ok(Self::build(
            RecordDatabase::open(&dir.join("chromarx.db"), STORE_SCHEMA)?,
            KeyValueStore::open(dir),
            config,
        ))
    }

    /// Fully in-memory store for tests.
    pub fn in_memory(config: StoreConfig) -> StoreResult<Self> {
        Ok(Self::build(
            RecordDatabase::open_in_memory(STORE_SCHEMA)?,
            KeyValueStore::in_memory(),
            config,
        ))
    }

    fn build(db: RecordDatabase, kv: KeyValueStore, config: StoreConfig) -> Self {
        Self {
            db,
            kv,
            recency: RecencyCache::new(config.recency_capacity),
            search_cache: SearchCache::new(config.search_cache_ttl),
            categories: Mutex::new(BTreeSet::new()),
            initialized: Mutex::new(false),
            chunk_size: config.chunk_size,
        }
    }

    // ===========================================
    // Initialization
    // ===========================================

    /// One-time setup: legacy migration, category preload, recency cache
    /// preload. Idempotent; concurrent callers block on the first run and
    /// then see it as done. A failed run is retried by the next caller.
    pub fn initialize(&self) -> StoreResult<()> {
        let mut initialized = self.initialized.lock();
        if *initialized {
            return Ok(());
        }
        self.migrate_legacy_storage()?;
        self.preload_categories()?;
        self.preload_recency_cache()?;
        *initialized = true;
        Ok(())
    }

    /// Moves the flat legacy bookmark array into the database, at most
    /// once, gated by a persisted marker.
    fn migrate_legacy_storage(&self) -> StoreResult<()> {
        let marker: Option<MetaMarker> = self.db.get(METADATA, MIGRATION_MARKER)?;
        if marker.is_some() {
            return Ok(());
        }

        let legacy: Option<Vec<Bookmark>> =
            self.kv.get(LEGACY_BOOKMARKS_KEY, &KvOptions::local());
        if let Some(legacy) = legacy {
            debug!(count = legacy.len(), "migrating legacy bookmark storage");
            let normalized: Vec<Bookmark> =
                legacy.into_iter().map(Bookmark::normalize).collect();
            self.write_records(&normalized)?;
            for b in &normalized {
                self.register_category(b.category.as_deref())?;
            }
            self.kv.remove(LEGACY_BOOKMARKS_KEY, &KvOptions::local());
        }

        self.db.put(
            METADATA,
            &MetaMarker {
                id: MIGRATION_MARKER.to_string(),
                completed_at: now_ms(),
            },
        )?;
        Ok(())
    }

    fn preload_categories(&self) -> StoreResult<()> {
        let stored: Vec<Category> = self.db.get_all(CATEGORIES, &QueryOptions::default())?;
        let mut categories = self.categories.lock();
        for c in stored {
            categories.insert(c.name);
        }
        Ok(())
    }

    fn preload_recency_cache(&self) -> StoreResult<()> {
        let newest: Vec<Bookmark> = self.db.get_all(
            BOOKMARKS,
            &QueryOptions {
                index: Some("dateAdded"),
                direction: Direction::Reverse,
                limit: Some(self.recency.capacity()),
                offset: 0,
            },
        )?;
        self.recency.put_batch(&newest);
        Ok(())
    }

    // ===========================================
    // Write path (errors propagate)
    // ===========================================

    /// Adds or fully replaces a bookmark, keeping the index table, the
    /// recency cache, and the category registry in lockstep.
    pub fn add_bookmark(&self, bookmark: Bookmark) -> StoreResult<Bookmark> {
        self.initialize()?;
        let bookmark = bookmark.normalize();

        self.db.put(BOOKMARKS, &bookmark)?;
        self.db.put(BOOKMARK_INDEX, &build_index_entry(&bookmark))?;
        self.register_category(bookmark.category.as_deref())?;

        self.recency.put(&bookmark);
        self.search_cache.clear();
        Ok(bookmark)
    }

    /// Bulk add/replace. Only the newest entries of the batch are promoted
    /// into the recency cache.
    pub fn add_bookmarks(&self, bookmarks: Vec<Bookmark>) -> StoreResult<Vec<Bookmark>> {
        self.initialize()?;
        let bookmarks: Vec<Bookmark> =
            bookmarks.into_iter().map(Bookmark::normalize).collect();

        self.write_records(&bookmarks)?;
        for bookmark in &bookmarks {
            self.register_category(bookmark.category.as_deref())?;
        }

        self.recency.put_batch(&bookmarks);
        self.search_cache.clear();
        Ok(bookmarks)
    }

    /// Full-replace update. Same write path as add; callers merge fields
    /// explicitly beforehand.
    pub fn update_bookmark(&self, bookmark: Bookmark) -> StoreResult<Bookmark> {
        self.add_bookmark(bookmark)
    }

    /// Removes a bookmark from both tables and the recency cache.
    pub fn delete_bookmark(&self, id: &str) -> StoreResult<()> {
        self.initialize()?;
        self.db.delete(BOOKMARKS, id)?;
        self.db.delete(BOOKMARK_INDEX, id)?;
        self.recency.remove(id);
        self.search_cache.clear();
        Ok(())
    }

    /// Wipes both bookmark tables and all in-memory caches. The category
    /// registry is left alone: categories outlive their bookmarks.
    pub fn clear(&self) -> StoreResult<()> {
        self.initialize()?;
        self.db.clear(BOOKMARKS)?;
        self.db.clear(BOOKMARK_INDEX)?;
        self.recency.clear();
        self.search_cache.clear();
        Ok(())
    }

    /// Writes both tables in chunks.
    fn write_records(&self, bookmarks: &[Bookmark]) -> StoreResult<()> {
        self.db.bulk_put(BOOKMARKS, bookmarks, self.chunk_size)?;
        let entries: Vec<BookmarkIndexEntry> =
            bookmarks.iter().map(build_index_entry).collect();
        self.db.bulk_put(BOOKMARK_INDEX, &entries, self.chunk_size)?;
        Ok(())
    }

    /// Registers a previously-unseen category. Categories are never pruned,
    /// even when their last bookmark goes away.
    fn register_category(&self, category: Option<&str>) -> StoreResult<()> {
        let Some(name) = category.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(());
        };
        let mut categories = self.categories.lock();
        if categories.insert(name.to_string()) {
            self.db.put(CATEGORIES, &Category::new(name))?;
        }
        Ok(())
    }

    // ===========================================
    // Read path (errors degrade)
    // ===========================================

    /// Fetches a bookmark by id. A recency cache hit short-circuits; a
    /// database hit is promoted into the cache.
    pub fn get_bookmark(&self, id: &str) -> Option<Bookmark> {
        if let Err(e) = self.initialize() {
            warn!(error = %e, "store initialization failed during read");
            return None;
        }
        if let Some(hit) = self.recency.get(id) {
            return Some(hit);
        }
        match self.db.get::<Bookmark>(BOOKMARKS, id) {
            Ok(Some(bookmark)) => {
                self.recency.put(&bookmark);
                Some(bookmark)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(id, error = %e, "bookmark read failed");
                None
            }
        }
    }

    /// Pages through all bookmarks ordered by `dateAdded` descending.
    pub fn get_all_bookmarks(&self, limit: Option<usize>, offset: usize) -> Vec<Bookmark> {
        self.read_page(limit, offset).unwrap_or_else(|e| {
            warn!(error = %e, "bookmark listing failed");
            Vec::new()
        })
    }

    /// Recent bookmarks, served from the recency cache when it covers the
    /// requested page.
    pub fn get_recent_bookmarks(&self, limit: usize, offset: usize) -> Vec<Bookmark> {
        if let Err(e) = self.initialize() {
            warn!(error = %e, "store initialization failed during read");
            return Vec::new();
        }
        if let Some(page) = self.recency.recent_page(limit, offset) {
            debug!(limit, offset, "recent page served from cache");
            return page;
        }
        self.get_all_bookmarks(Some(limit), offset)
    }

    fn read_page(&self, limit: Option<usize>, offset: usize) -> StoreResult<Vec<Bookmark>> {
        self.initialize()?;
        Ok(self.db.get_all(
            BOOKMARKS,
            &QueryOptions {
                index: Some("dateAdded"),
                direction: Direction::Reverse,
                limit,
                offset,
            },
        )?)
    }

    /// All registered category names, sorted.
    pub fn get_all_categories(&self) -> Vec<String> {
        if let Err(e) = self.initialize() {
            warn!(error = %e, "store initialization failed during read");
            return Vec::new();
        }
        self.categories.lock().iter().cloned().collect()
    }

    pub fn get_bookmark_count(&self) -> usize {
        let count = self
            .initialize()
            .and_then(|()| Ok(self.db.count(BOOKMARKS, None)?));
        count.unwrap_or_else(|e| {
            warn!(error = %e, "bookmark count failed");
            0
        })
    }

    // ===========================================
    // Search
    // ===========================================

    /// Scored free-text search. Degrades to an empty list on storage
    /// failure — callers treat empty as "no results".
    pub fn search_bookmarks(&self, query: &SearchQuery) -> Vec<Bookmark> {
        self.try_search(query).unwrap_or_else(|e| {
            warn!(query = %query.query, error = %e, "search failed");
            Vec::new()
        })
    }

    fn try_search(&self, query: &SearchQuery) -> StoreResult<Vec<Bookmark>> {
        self.initialize()?;
        let words = query.words();

        // Empty search with no filter is just the recent listing.
        if words.is_empty() && query.category.is_none() {
            return Ok(self.get_recent_bookmarks(query.limit, query.offset));
        }

        let cache_key = query.cache_key();
        if let Some(cached) = self.search_cache.get(&cache_key) {
            debug!(key = %cache_key, "search served from cache");
            return Ok(cached);
        }

        let mut entries: Vec<BookmarkIndexEntry> =
            self.db.get_all(BOOKMARK_INDEX, &QueryOptions::default())?;

        // Category filter is an exact match, not a substring.
        if let Some(filter) = &query.category {
            let filter = filter.to_lowercase();
            entries.retain(|e| e.category.as_deref() == Some(filter.as_str()));
        }

        if words.is_empty() {
            // Filter-only path: no scoring, field sort only.
            let sort_by = match query.sort_by {
                SortBy::Relevance => SortBy::DateAdded,
                other => other,
            };
            let mut scored: Vec<(BookmarkIndexEntry, u32)> =
                entries.into_iter().map(|e| (e, 0)).collect();
            search::sort_entries(&mut scored, sort_by, query.sort_order);
            return Ok(self.hydrate_page(&scored, query.limit, query.offset));
        }

        let mut scored: Vec<(BookmarkIndexEntry, u32)> = entries
            .into_iter()
            .filter_map(|e| {
                let score = search::score_entry(&e, &words);
                (score > 0).then_some((e, score))
            })
            .collect();
        search::sort_entries(&mut scored, query.sort_by, query.sort_order);

        let results = self.hydrate_page(&scored, query.limit, query.offset);
        self.search_cache.put(cache_key, results.clone());
        Ok(results)
    }

    /// Lightweight autocomplete: title prefix, url substring, or category
    /// prefix.
    pub fn prefix_search(&self, prefix: &str, limit: usize) -> Vec<Bookmark> {
        let run = || -> StoreResult<Vec<Bookmark>> {
            self.initialize()?;
            let prefix = prefix.to_lowercase();
            if prefix.is_empty() {
                return Ok(Vec::new());
            }
            let entries: Vec<BookmarkIndexEntry> =
                self.db.get_all(BOOKMARK_INDEX, &QueryOptions::default())?;
            let mut scored: Vec<(BookmarkIndexEntry, u32)> = entries
                .into_iter()
                .filter_map(|e| {
                    let score = search::prefix_score(&e, &prefix);
                    (score > 0).then_some((e, score))
                })
                .collect();
            search::sort_entries(&mut scored, SortBy::Relevance, SortOrder::Desc);
            Ok(self.hydrate_page(&scored, limit, 0))
        };
        run().unwrap_or_else(|e| {
            warn!(prefix, error = %e, "prefix search failed");
            Vec::new()
        })
    }

    /// Pages scored index entries and hydrates them to full bookmarks
    /// through the cache-aware `get_bookmark`.
    fn hydrate_page(
        &self,
        scored: &[(BookmarkIndexEntry, u32)],
        limit: usize,
        offset: usize,
    ) -> Vec<Bookmark> {
        scored
            .iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(entry, _)| self.get_bookmark(&entry.id))
            .collect()
    }
}

#[cfg(test)]
mod tests;
