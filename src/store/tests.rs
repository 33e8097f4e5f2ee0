use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn store() -> BookmarkStore {
    BookmarkStore::in_memory(StoreConfig::default()).unwrap()
}

fn small_cache_store(capacity: usize) -> BookmarkStore {
    BookmarkStore::in_memory(StoreConfig {
        recency_capacity: capacity,
        ..StoreConfig::default()
    })
    .unwrap()
}

fn bookmark(id: &str, title: &str, date_added: i64) -> Bookmark {
    let mut b = Bookmark::new(title, Some(format!("https://example.com/{id}")));
    b.id = id.to_string();
    b.date_added = date_added;
    b
}

// ===========================================
// Round-trip and index consistency
// ===========================================

#[test]
fn add_then_get_round_trips_field_for_field() {
    let store = store();
    let mut b = bookmark("b1", "Rust Book", 100);
    b.category = Some("Programming".into());
    b.tags = Some(vec!["rust".into(), "books".into()]);
    b.content = Some("ownership and borrowing".into());
    b.parent_id = Some("folder-1".into());
    b.metadata.insert("syncStatus".into(), json!("clean"));

    store.add_bookmark(b.clone()).unwrap();
    assert_eq!(store.get_bookmark("b1"), Some(b));
}

#[test]
fn optional_fields_left_unset_stay_unset() {
    let store = store();
    let b = bookmark("b1", "Plain", 100);
    store.add_bookmark(b.clone()).unwrap();

    let back = store.get_bookmark("b1").unwrap();
    assert_eq!(back.category, None);
    assert_eq!(back.tags, None);
    assert_eq!(back.content, None);
    assert_eq!(back, b);
}

#[test]
fn index_entry_tracks_every_write() {
    let store = store();
    let mut b = bookmark("b1", "Rust Book", 100);
    b.category = Some("Programming".into());
    store.add_bookmark(b.clone()).unwrap();

    let entry: BookmarkIndexEntry = store.db.get(BOOKMARK_INDEX, "b1").unwrap().unwrap();
    assert_eq!(entry.title, "rust book");
    assert_eq!(entry.category.as_deref(), Some("programming"));

    b.title = "Updated Title".into();
    store.update_bookmark(b).unwrap();
    let entry: BookmarkIndexEntry = store.db.get(BOOKMARK_INDEX, "b1").unwrap().unwrap();
    assert_eq!(entry.title, "updated title");
}

#[test]
fn empty_title_falls_back_to_placeholder_at_ingestion() {
    let store = store();
    store.add_bookmark(bookmark("b1", "  ", 1)).unwrap();
    assert_eq!(
        store.get_bookmark("b1").unwrap().title,
        crate::domain::UNTITLED_PLACEHOLDER
    );
}

// ===========================================
// Delete
// ===========================================

#[test]
fn delete_removes_record_index_entry_and_cache_slot() {
    let store = store();
    store.add_bookmark(bookmark("b1", "doomed", 1)).unwrap();
    store.delete_bookmark("b1").unwrap();

    assert_eq!(store.get_bookmark("b1"), None);
    let entry: Option<BookmarkIndexEntry> = store.db.get(BOOKMARK_INDEX, "b1").unwrap();
    assert!(entry.is_none());
    assert!(store.recency.get("b1").is_none());
    assert_eq!(store.get_bookmark_count(), 0);
}

// ===========================================
// Bulk writes
// ===========================================

#[test]
fn bulk_add_same_id_twice_leaves_one_record_latest_wins() {
    let store = store();
    store
        .add_bookmarks(vec![bookmark("b1", "first", 1)])
        .unwrap();
    store
        .add_bookmarks(vec![bookmark("b1", "second", 2)])
        .unwrap();

    assert_eq!(store.get_bookmark_count(), 1);
    assert_eq!(store.get_bookmark("b1").unwrap().title, "second");
}

#[test]
fn bulk_add_promotes_only_newest_into_recency_cache() {
    let store = small_cache_store(3);
    let batch: Vec<Bookmark> = (0..10)
        .map(|i| bookmark(&format!("b{i}"), &format!("t{i}"), i))
        .collect();
    store.add_bookmarks(batch).unwrap();

    assert!(store.recency.get("b9").is_some());
    assert!(store.recency.get("b0").is_none());
    // Evicted entries are still readable through the database.
    assert!(store.get_bookmark("b0").is_some());
}

// ===========================================
// Listing and pagination
// ===========================================

fn seed_dated(store: &BookmarkStore, n: i64) {
    let batch: Vec<Bookmark> = (0..n)
        .map(|i| bookmark(&format!("b{i:02}"), &format!("title {i}"), i))
        .collect();
    store.add_bookmarks(batch).unwrap();
}

#[test]
fn get_all_orders_by_date_added_descending_and_paginates() {
    let store = store();
    seed_dated(&store, 20);

    let page = store.get_all_bookmarks(Some(10), 5);
    let dates: Vec<i64> = page.iter().map(|b| b.date_added).collect();
    // Items 6 through 15 of the descending ordering.
    assert_eq!(dates, (5..15).rev().collect::<Vec<i64>>());
}

#[test]
fn recent_serves_from_cache_when_page_is_covered() {
    let store = small_cache_store(10);
    seed_dated(&store, 10);

    let recent = store.get_recent_bookmarks(5, 0);
    let dates: Vec<i64> = recent.iter().map(|b| b.date_added).collect();
    assert_eq!(dates, vec![9, 8, 7, 6, 5]);
}

#[test]
fn recent_falls_through_to_database_when_cache_is_short() {
    let store = small_cache_store(2);
    seed_dated(&store, 10);

    let recent = store.get_recent_bookmarks(5, 0);
    assert_eq!(recent.len(), 5);
    assert_eq!(recent[0].date_added, 9);
}

#[test]
fn preload_fills_recency_cache_from_newest_records() {
    // A fresh store over the same database must warm its cache on
    // initialize.
    let dir = tempfile::tempdir().unwrap();
    let store = BookmarkStore::open(dir.path(), StoreConfig::default()).unwrap();
    seed_dated(&store, 5);
    drop(store);

    let store = BookmarkStore::open(dir.path(), StoreConfig::default()).unwrap();
    store.initialize().unwrap();
    assert!(store.recency.get("b04").is_some());
}

// ===========================================
// Search
// ===========================================

#[test]
fn empty_search_on_empty_store_returns_empty_not_error() {
    let store = store();
    assert!(store.search_bookmarks(&SearchQuery::default()).is_empty());
}

#[test]
fn title_match_outranks_url_match() {
    let store = store();
    let a = bookmark("a", "react handbook", 1);
    let mut b = bookmark("b", "frontend notes", 2);
    b.url = Some("https://react.dev".into());
    store.add_bookmarks(vec![a, b]).unwrap();

    let results = store.search_bookmarks(&SearchQuery::new("react"));
    let ids: Vec<&str> = results.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn non_matching_rows_are_dropped() {
    let store = store();
    store
        .add_bookmarks(vec![
            bookmark("a", "react", 1),
            bookmark("z", "cooking recipes", 2),
        ])
        .unwrap();
    let results = store.search_bookmarks(&SearchQuery::new("react"));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "a");
}

#[test]
fn category_filter_is_exact_match_not_substring() {
    let store = store();
    let mut a = bookmark("a", "one", 1);
    a.category = Some("Work".into());
    let mut b = bookmark("b", "two", 2);
    b.category = Some("Workout".into());
    store.add_bookmarks(vec![a, b]).unwrap();

    let results = store.search_bookmarks(&SearchQuery::default().category("work"));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "a");
}

#[test]
fn filter_only_search_sorts_by_requested_field() {
    let store = store();
    let mut a = bookmark("a", "zebra", 1);
    a.category = Some("Animals".into());
    let mut b = bookmark("b", "aardvark", 2);
    b.category = Some("Animals".into());
    store.add_bookmarks(vec![a, b]).unwrap();

    let results = store.search_bookmarks(
        &SearchQuery::default()
            .category("animals")
            .sort(SortBy::Title, SortOrder::Asc),
    );
    let ids: Vec<&str> = results.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
}

#[test]
fn query_and_category_filter_combine() {
    let store = store();
    let mut a = bookmark("a", "rust async", 1);
    a.category = Some("Work".into());
    let mut b = bookmark("b", "rust games", 2);
    b.category = Some("Fun".into());
    store.add_bookmarks(vec![a, b]).unwrap();

    let results = store.search_bookmarks(&SearchQuery::new("rust").category("work"));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "a");
}

#[test]
fn search_results_are_cached_and_invalidated_on_write() {
    let store = store();
    store.add_bookmark(bookmark("a", "rust book", 1)).unwrap();

    let query = SearchQuery::new("rust");
    assert_eq!(store.search_bookmarks(&query).len(), 1);
    // Cached now.
    assert!(store.search_cache.get(&query.cache_key()).is_some());

    // Any write clears the whole search cache.
    store.add_bookmark(bookmark("b", "rust blog", 2)).unwrap();
    assert!(store.search_cache.get(&query.cache_key()).is_none());
    assert_eq!(store.search_bookmarks(&query).len(), 2);
}

#[test]
fn search_pagination_respects_offset() {
    let store = store();
    let batch: Vec<Bookmark> = (0..10)
        .map(|i| bookmark(&format!("b{i}"), &format!("rust volume {i}"), i))
        .collect();
    store.add_bookmarks(batch).unwrap();

    let page1 = store.search_bookmarks(
        &SearchQuery::new("rust").sort(SortBy::DateAdded, SortOrder::Desc).page(4, 0),
    );
    let page2 = store.search_bookmarks(
        &SearchQuery::new("rust").sort(SortBy::DateAdded, SortOrder::Desc).page(4, 4),
    );
    assert_eq!(page1.len(), 4);
    assert_eq!(page2.len(), 4);
    assert_eq!(page1[0].date_added, 9);
    assert_eq!(page2[0].date_added, 5);
}

#[test]
fn prefix_search_matches_title_url_and_category_starts() {
    let store = store();
    let a = bookmark("a", "Rust by Example", 1);
    let mut b = bookmark("b", "compiler notes", 2);
    b.url = Some("https://rustc-dev-guide.rust-lang.org".into());
    let mut c = bookmark("c", "misc", 3);
    c.category = Some("Rust Learning".into());
    let d = bookmark("d", "cooking", 4);
    store.add_bookmarks(vec![a, b, c, d]).unwrap();

    let results = store.prefix_search("rust", 10);
    let ids: Vec<&str> = results.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    assert!(!ids.contains(&"d"));
    // Title prefix outranks url substring outranks category prefix.
    assert_eq!(ids[0], "a");
}

#[test]
fn prefix_search_truncates_to_limit() {
    let store = store();
    let batch: Vec<Bookmark> = (0..10)
        .map(|i| bookmark(&format!("b{i}"), &format!("rust {i}"), i))
        .collect();
    store.add_bookmarks(batch).unwrap();
    assert_eq!(store.prefix_search("rust", 3).len(), 3);
}

// ===========================================
// Categories
// ===========================================

#[test]
fn categories_register_lazily_and_deduplicate() {
    let store = store();
    let mut a = bookmark("a", "one", 1);
    a.category = Some("Work".into());
    let mut b = bookmark("b", "two", 2);
    b.category = Some("Work".into());
    let mut c = bookmark("c", "three", 3);
    c.category = Some("News".into());
    store.add_bookmarks(vec![a, b, c]).unwrap();

    assert_eq!(
        store.get_all_categories(),
        vec!["News".to_string(), "Work".to_string()]
    );
    assert_eq!(store.db.count(CATEGORIES, None).unwrap(), 2);
}

#[test]
fn orphaned_categories_persist_after_their_last_bookmark() {
    let store = store();
    let mut a = bookmark("a", "one", 1);
    a.category = Some("Ephemeral".into());
    store.add_bookmark(a).unwrap();
    store.delete_bookmark("a").unwrap();

    assert_eq!(store.get_all_categories(), vec!["Ephemeral".to_string()]);
}

#[test]
fn categories_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = BookmarkStore::open(dir.path(), StoreConfig::default()).unwrap();
        let mut a = bookmark("a", "one", 1);
        a.category = Some("Work".into());
        store.add_bookmark(a).unwrap();
    }
    let store = BookmarkStore::open(dir.path(), StoreConfig::default()).unwrap();
    assert_eq!(store.get_all_categories(), vec!["Work".to_string()]);
}

// ===========================================
// Migration
// ===========================================

#[test]
fn legacy_storage_migrates_once() {
    let store = store();
    let mut untitled = bookmark("old2", "x", 2);
    untitled.title = String::new();
    let legacy = vec![bookmark("old1", "legacy one", 1), untitled];
    assert!(store.kv.set(
        LEGACY_BOOKMARKS_KEY,
        &legacy,
        &KvOptions::local()
    ));

    store.initialize().unwrap();
    assert_eq!(store.get_bookmark_count(), 2);
    // Empty legacy titles are normalized on the way in.
    assert_eq!(
        store.get_bookmark("old2").unwrap().title,
        crate::domain::UNTITLED_PLACEHOLDER
    );
    // The legacy blob is gone and the marker prevents a re-run.
    let leftover: Option<Vec<Bookmark>> =
        store.kv.get(LEGACY_BOOKMARKS_KEY, &KvOptions::local());
    assert!(leftover.is_none());
    let marker: Option<MetaMarker> = store.db.get(METADATA, MIGRATION_MARKER).unwrap();
    assert!(marker.is_some());
}

#[test]
fn migration_marker_blocks_second_run() {
    let store = store();
    store.initialize().unwrap();

    // A legacy blob appearing after the marker is ignored.
    store.kv.set(
        LEGACY_BOOKMARKS_KEY,
        &vec![bookmark("late", "too late", 1)],
        &KvOptions::local(),
    );
    store.migrate_legacy_storage().unwrap();
    assert_eq!(store.get_bookmark("late"), None);
}

// ===========================================
// Clear
// ===========================================

#[test]
fn clear_wipes_tables_and_caches_but_not_categories() {
    let store = store();
    let mut a = bookmark("a", "one", 1);
    a.category = Some("Keep Me".into());
    store.add_bookmark(a).unwrap();

    store.clear().unwrap();
    assert_eq!(store.get_bookmark_count(), 0);
    assert_eq!(store.get_bookmark("a"), None);
    assert!(store.search_bookmarks(&SearchQuery::new("one")).is_empty());
    assert_eq!(store.get_all_categories(), vec!["Keep Me".to_string()]);
}
