//! Category registry entries and slug derivation.

use serde::{Deserialize, Serialize};

/// A registered bookmark category.
///
/// Created lazily the first time a bookmark is written with a previously
/// unseen category value. Never deleted automatically — a category whose
/// last bookmark is removed stays registered so it remains available for
/// reuse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Deterministic slug derived from `name`.
    pub id: String,
    pub name: String,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: category_slug(&name),
            name,
        }
    }
}

/// Derives the deterministic category slug: lower-cased, whitespace runs
/// collapsed to a single underscore, trimmed.
pub fn category_slug(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}
