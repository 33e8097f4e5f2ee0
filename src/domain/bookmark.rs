//! The Bookmark entity.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;

/// Title assigned to bookmarks ingested without one.
pub const UNTITLED_PLACEHOLDER: &str = "Untitled";

/// A stored bookmark.
///
/// `id` is unique across the `bookmarks` table. Writing a bookmark with an
/// existing id is a full replace, not a merge — callers merge explicitly
/// before updating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    /// Stable unique identifier, assigned by the native source or generated.
    pub id: String,

    /// Display title. Non-empty at rest; empty titles fall back to
    /// [`UNTITLED_PLACEHOLDER`] at ingestion.
    pub title: String,

    /// Page URL. Folders have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Creation time in epoch milliseconds. Set once; sync never mutates it
    /// unless it is absent on the stored record.
    pub date_added: i64,

    /// Containing folder id. Weak reference — no cascading delete at this
    /// layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// User- or AI-assigned category. Single-valued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// User-assigned tags, in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    /// Extracted page text or summary used for search relevance. Large;
    /// excluded from the index table's slim projection of other fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Open-ended record for sync-status and provenance fields.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Bookmark {
    /// Creates a bookmark with a freshly generated id and the current time.
    pub fn new(title: impl Into<String>, url: Option<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            title: normalize_title(title.into()),
            url,
            date_added: Utc::now().timestamp_millis(),
            parent_id: None,
            category: None,
            tags: None,
            content: None,
            metadata: Map::new(),
        }
    }

    /// Replaces an empty title with the placeholder.
    pub fn normalize(mut self) -> Self {
        self.title = normalize_title(self.title);
        self
    }

    /// Returns the tags as a slice, empty when unset.
    pub fn tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or_default()
    }
}

fn normalize_title(title: String) -> String {
    if title.trim().is_empty() {
        UNTITLED_PLACEHOLDER.to_string()
    } else {
        title
    }
}
