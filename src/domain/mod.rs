//! Core domain types: bookmarks, categories, and the native bookmark tree.

mod bookmark;
mod category;
mod tree;

pub use bookmark::{Bookmark, UNTITLED_PLACEHOLDER};
pub use category::{Category, category_slug};
pub use tree::TreeNode;
