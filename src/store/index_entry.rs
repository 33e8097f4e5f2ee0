//! Derived search index records.

use serde::{Deserialize, Serialize};

use crate::domain::Bookmark;

/// Slim, lower-cased projection of a bookmark kept in the `bookmark_index`
/// table so search scans touch less data than the full records.
///
/// 1:1 with its source bookmark by id: created or replaced atomically with
/// every bookmark write, deleted with every bookmark delete, never created
/// independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkIndexEntry {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub date_added: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Builds the index entry for a bookmark. Pure projection: lower-cases the
/// searchable text fields and carries the ordering fields through.
pub fn build_index_entry(bookmark: &Bookmark) -> BookmarkIndexEntry {
    BookmarkIndexEntry {
        id: bookmark.id.clone(),
        title: bookmark.title.to_lowercase(),
        url: bookmark.url.as_ref().map(|u| u.to_lowercase()),
        category: bookmark.category.as_ref().map(|c| c.to_lowercase()),
        tags: bookmark
            .tags
            .as_ref()
            .map(|tags| tags.iter().map(|t| t.to_lowercase()).collect()),
        content: bookmark.content.as_ref().map(|c| c.to_lowercase()),
        date_added: bookmark.date_added,
        parent_id: bookmark.parent_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lowercases_all_text_fields() {
        let mut b = Bookmark::new("Rust Book", Some("https://Doc.Rust-Lang.org".into()));
        b.category = Some("Programming".into());
        b.tags = Some(vec!["Rust".into(), "BOOKS".into()]);
        b.content = Some("The Rust Programming Language".into());

        let entry = build_index_entry(&b);
        assert_eq!(entry.title, "rust book");
        assert_eq!(entry.url.as_deref(), Some("https://doc.rust-lang.org"));
        assert_eq!(entry.category.as_deref(), Some("programming"));
        assert_eq!(
            entry.tags,
            Some(vec!["rust".to_string(), "books".to_string()])
        );
        assert_eq!(
            entry.content.as_deref(),
            Some("the rust programming language")
        );
    }

    #[test]
    fn carries_id_and_ordering_fields_through() {
        let mut b = Bookmark::new("A", None);
        b.parent_id = Some("folder-1".into());
        let entry = build_index_entry(&b);
        assert_eq!(entry.id, b.id);
        assert_eq!(entry.date_added, b.date_added);
        assert_eq!(entry.parent_id.as_deref(), Some("folder-1"));
    }

    #[test]
    fn absent_fields_stay_absent() {
        let b = Bookmark::new("A", None);
        let entry = build_index_entry(&b);
        assert_eq!(entry.url, None);
        assert_eq!(entry.category, None);
        assert_eq!(entry.tags, None);
        assert_eq!(entry.content, None);
    }
}
