//! Native bookmark tree nodes as handed over by the host source.

use serde::{Deserialize, Serialize};

/// A node in the native bookmark tree.
///
/// Folders carry `children` and no `url`; leaf bookmarks carry a `url`.
/// The native source never supplies category, tags, or content — those are
/// user enrichment preserved by the sync layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Leaf constructor for tests and fixtures.
    pub fn leaf(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Folder constructor for tests and fixtures.
    pub fn folder(
        id: impl Into<String>,
        title: impl Into<String>,
        children: Vec<TreeNode>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            children,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_partial_nodes() {
        let node: TreeNode =
            serde_json::from_str(r#"{"id":"1","title":"root","children":[{"id":"2","title":"x","url":"https://x.dev"}]}"#)
                .unwrap();
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0].url.as_deref(), Some("https://x.dev"));
        assert!(node.url.is_none());
    }
}
