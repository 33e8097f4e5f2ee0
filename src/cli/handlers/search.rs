//! Search command handler.

use anyhow::Result;
use std::path::Path;

use super::list::print_bookmarks;
use super::open_store;
use crate::cli::{SearchArgs, SortField};
use crate::store::{SearchQuery, SortBy, SortOrder};

pub fn handle_search(args: &SearchArgs, data_dir: &Path) -> Result<()> {
    let store = open_store(data_dir)?;

    let mut query = SearchQuery::new(&args.query)
        .page(args.limit, args.offset)
        .sort(sort_by(args.sort), sort_order(args.asc));
    if let Some(category) = &args.category {
        query = query.category(category);
    }

    let results = store.search_bookmarks(&query);
    print_bookmarks(&results, args.format)
}

fn sort_by(field: SortField) -> SortBy {
    match field {
        SortField::Relevance => SortBy::Relevance,
        SortField::Title => SortBy::Title,
        SortField::Date => SortBy::DateAdded,
        SortField::Category => SortBy::Category,
    }
}

fn sort_order(asc: bool) -> SortOrder {
    if asc { SortOrder::Asc } else { SortOrder::Desc }
}
