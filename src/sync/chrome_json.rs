//! Bookmark source reading a Chrome-format `Bookmarks` JSON file.
//!
//! Chrome stores timestamps as WebKit microseconds (since 1601-01-01)
//! serialized as decimal strings; they are converted to epoch milliseconds
//! on the way in.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::{BookmarkSource, SyncError, SyncResult};
use crate::domain::TreeNode;

/// Milliseconds between the WebKit epoch (1601-01-01) and the Unix epoch.
const WEBKIT_EPOCH_OFFSET_MS: i64 = 11_644_473_600_000;

#[derive(Debug, Deserialize)]
struct ChromeFile {
    roots: ChromeRoots,
}

#[derive(Debug, Default, Deserialize)]
struct ChromeRoots {
    bookmark_bar: Option<ChromeNode>,
    other: Option<ChromeNode>,
    synced: Option<ChromeNode>,
}

#[derive(Debug, Deserialize)]
struct ChromeNode {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    date_added: Option<String>,
    #[serde(default)]
    children: Vec<ChromeNode>,
}

fn webkit_to_epoch_ms(raw: &str) -> Option<i64> {
    let micros: i64 = raw.parse().ok()?;
    if micros == 0 {
        return None;
    }
    Some(micros / 1000 - WEBKIT_EPOCH_OFFSET_MS)
}

fn convert(node: &ChromeNode, parent_id: Option<&str>) -> TreeNode {
    TreeNode {
        id: node.id.clone(),
        title: node.name.clone(),
        url: if node.kind == "url" {
            node.url.clone()
        } else {
            None
        },
        date_added: node.date_added.as_deref().and_then(webkit_to_epoch_ms),
        parent_id: parent_id.map(String::from),
        children: node
            .children
            .iter()
            .map(|child| convert(child, Some(&node.id)))
            .collect(),
    }
}

/// Reads the bookmark tree out of an exported Chrome `Bookmarks` file.
pub struct ChromeJsonSource {
    path: PathBuf,
}

impl ChromeJsonSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self) -> SyncResult<ChromeFile> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| SyncError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SyncError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

impl BookmarkSource for ChromeJsonSource {
    fn is_available(&self) -> bool {
        self.path.is_file()
    }

    fn tree(&self) -> SyncResult<Vec<TreeNode>> {
        let file = self.parse()?;
        let roots = [
            file.roots.bookmark_bar,
            file.roots.other,
            file.roots.synced,
        ];
        Ok(roots
            .iter()
            .flatten()
            .map(|root| convert(root, None))
            .collect())
    }

    /// Flat recent listing derived from the same file: newest first by
    /// `dateAdded`, undated nodes last.
    fn recent(&self, n: usize) -> SyncResult<Vec<TreeNode>> {
        let roots = self.tree()?;
        let mut leaves = Vec::new();
        for root in &roots {
            collect_leaves(root, &mut leaves);
        }
        leaves.sort_by(|a, b| b.date_added.cmp(&a.date_added));
        leaves.truncate(n);
        Ok(leaves)
    }
}

fn collect_leaves(node: &TreeNode, out: &mut Vec<TreeNode>) {
    if node.url.is_some() {
        let mut leaf = node.clone();
        leaf.children = Vec::new();
        out.push(leaf);
    }
    for child in &node.children {
        collect_leaves(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const FIXTURE: &str = r#"{
        "roots": {
            "bookmark_bar": {
                "id": "1",
                "name": "Bookmarks bar",
                "type": "folder",
                "children": [
                    {
                        "id": "10",
                        "name": "Rust Book",
                        "type": "url",
                        "url": "https://doc.rust-lang.org/book",
                        "date_added": "13300000000000000"
                    },
                    {
                        "id": "11",
                        "name": "Old One",
                        "type": "url",
                        "url": "https://old.example",
                        "date_added": "13200000000000000"
                    }
                ]
            },
            "other": {
                "id": "2",
                "name": "Other bookmarks",
                "type": "folder",
                "children": []
            }
        }
    }"#;

    fn fixture_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_roots_into_tree_nodes() {
        let file = fixture_file();
        let source = ChromeJsonSource::new(file.path());
        assert!(source.is_available());

        let roots = source.tree().unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].title, "Bookmarks bar");
        assert_eq!(roots[0].children.len(), 2);

        let leaf = &roots[0].children[0];
        assert_eq!(leaf.id, "10");
        assert_eq!(leaf.url.as_deref(), Some("https://doc.rust-lang.org/book"));
        assert_eq!(leaf.parent_id.as_deref(), Some("1"));
    }

    #[test]
    fn converts_webkit_microseconds_to_epoch_milliseconds() {
        assert_eq!(
            webkit_to_epoch_ms("13300000000000000"),
            Some(13_300_000_000_000 - WEBKIT_EPOCH_OFFSET_MS)
        );
        assert_eq!(webkit_to_epoch_ms("0"), None);
        assert_eq!(webkit_to_epoch_ms("not a number"), None);
    }

    #[test]
    fn folders_carry_no_url_even_when_present_in_the_file() {
        let raw = r#"{"roots":{"bookmark_bar":{"id":"1","name":"bar","type":"folder","url":"https://bogus.example","children":[]}}}"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(raw.as_bytes()).unwrap();

        let roots = ChromeJsonSource::new(file.path()).tree().unwrap();
        assert!(roots[0].url.is_none());
    }

    #[test]
    fn recent_lists_newest_first() {
        let file = fixture_file();
        let source = ChromeJsonSource::new(file.path());

        let recent = source.recent(10).unwrap();
        let ids: Vec<&str> = recent.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["10", "11"]);

        let capped = source.recent(1).unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn missing_file_is_unavailable_and_errors_on_read() {
        let source = ChromeJsonSource::new("/nonexistent/Bookmarks");
        assert!(!source.is_available());
        assert!(matches!(source.tree(), Err(SyncError::Io { .. })));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();
        let source = ChromeJsonSource::new(file.path());
        assert!(matches!(source.tree(), Err(SyncError::Parse { .. })));
    }
}
