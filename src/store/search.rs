//! Search query types and the relevance scoring algorithm.
//!
//! The weights establish a fixed field ordering — title over url over tags
//! over category over content — that ranking behavior depends on.

use super::index_entry::BookmarkIndexEntry;

const TITLE_WEIGHT: u32 = 10;
const URL_WEIGHT: u32 = 8;
const TAG_WEIGHT: u32 = 7;
const CATEGORY_WEIGHT: u32 = 6;
const EXACT_TITLE_BONUS: u32 = 5;
const CONTENT_WEIGHT: u32 = 3;
const TITLE_PREFIX_BONUS: u32 = 3;

/// Field to order search results by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    /// Additive relevance score (free-text searches only).
    #[default]
    Relevance,
    Title,
    DateAdded,
    Category,
}

/// Result ordering direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// A bookmark search request.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub limit: usize,
    pub offset: usize,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    /// Exact (case-insensitive) category match, not a substring filter.
    pub category: Option<String>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            limit: 50,
            offset: 0,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            category: None,
        }
    }
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn sort(mut self, by: SortBy, order: SortOrder) -> Self {
        self.sort_by = by;
        self.sort_order = order;
        self
    }

    /// Lower-cased whitespace-delimited query words.
    pub(super) fn words(&self) -> Vec<String> {
        self.query
            .to_lowercase()
            .split_whitespace()
            .map(String::from)
            .collect()
    }

    /// Composite cache key covering every parameter that affects results.
    pub(super) fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{:?}|{:?}|{}",
            self.query.to_lowercase(),
            self.limit,
            self.offset,
            self.sort_by,
            self.sort_order,
            self.category.as_deref().unwrap_or("").to_lowercase(),
        )
    }
}

/// Computes the additive relevance score of an index entry for the given
/// lower-cased query words. Zero means no match.
pub(super) fn score_entry(entry: &BookmarkIndexEntry, words: &[String]) -> u32 {
    let mut score = 0;
    for word in words {
        if entry.title.contains(word.as_str()) {
            score += TITLE_WEIGHT;
            if entry.title == *word {
                score += EXACT_TITLE_BONUS;
            }
            if entry.title.starts_with(&format!("{word} ")) {
                score += TITLE_PREFIX_BONUS;
            }
        }
        if entry.url.as_deref().is_some_and(|u| u.contains(word.as_str())) {
            score += URL_WEIGHT;
        }
        if entry
            .category
            .as_deref()
            .is_some_and(|c| c.contains(word.as_str()))
        {
            score += CATEGORY_WEIGHT;
        }
        if entry
            .tags
            .as_deref()
            .is_some_and(|tags| tags.iter().any(|t| t.contains(word.as_str())))
        {
            score += TAG_WEIGHT;
        }
        if entry
            .content
            .as_deref()
            .is_some_and(|c| c.contains(word.as_str()))
        {
            score += CONTENT_WEIGHT;
        }
    }
    score
}

/// Scores used by the autocomplete prefix search: title prefix, url
/// substring, category prefix.
pub(super) fn prefix_score(entry: &BookmarkIndexEntry, prefix: &str) -> u32 {
    let mut score = 0;
    if entry.title.starts_with(prefix) {
        score += TITLE_WEIGHT;
    }
    if entry.url.as_deref().is_some_and(|u| u.contains(prefix)) {
        score += URL_WEIGHT;
    }
    if entry.category.as_deref().is_some_and(|c| c.starts_with(prefix)) {
        score += CATEGORY_WEIGHT;
    }
    score
}

/// Sorts scored entries by the requested field. `Relevance` orders by
/// score; the other fields ignore the score entirely.
pub(super) fn sort_entries(
    entries: &mut [(BookmarkIndexEntry, u32)],
    sort_by: SortBy,
    sort_order: SortOrder,
) {
    entries.sort_by(|(a, sa), (b, sb)| {
        let ordering = match sort_by {
            SortBy::Relevance => sa.cmp(sb).then_with(|| a.date_added.cmp(&b.date_added)),
            SortBy::Title => a.title.cmp(&b.title),
            SortBy::DateAdded => a.date_added.cmp(&b.date_added),
            SortBy::Category => a
                .category
                .as_deref()
                .unwrap_or("")
                .cmp(b.category.as_deref().unwrap_or("")),
        };
        match sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}
