//! Handlers for listing commands: ls, recent, categories, count.

use anyhow::Result;
use std::path::Path;

use super::{bookmark_line, open_store};
use crate::cli::output::{BookmarkListing, CategoryListing, Output, OutputFormat};
use crate::cli::{CategoriesArgs, ListArgs, RecentArgs};
use crate::domain::Bookmark;

pub fn handle_list(args: &ListArgs, data_dir: &Path) -> Result<()> {
    let store = open_store(data_dir)?;
    let bookmarks = store.get_all_bookmarks(args.limit, args.offset);
    print_bookmarks(&bookmarks, args.format)
}

pub fn handle_recent(args: &RecentArgs, data_dir: &Path) -> Result<()> {
    let store = open_store(data_dir)?;
    let bookmarks = store.get_recent_bookmarks(args.limit, 0);
    print_bookmarks(&bookmarks, args.format)
}

pub fn handle_categories(args: &CategoriesArgs, data_dir: &Path) -> Result<()> {
    let store = open_store(data_dir)?;
    let categories = store.get_all_categories();

    match args.format {
        OutputFormat::Human => {
            if categories.is_empty() {
                println!("No categories.");
            } else {
                for name in &categories {
                    println!("{name}");
                }
            }
        }
        OutputFormat::Json => {
            let listings: Vec<CategoryListing> = categories
                .into_iter()
                .map(|name| CategoryListing { name })
                .collect();
            println!("{}", serde_json::to_string_pretty(&Output::new(listings))?);
        }
    }
    Ok(())
}

pub fn handle_count(data_dir: &Path) -> Result<()> {
    let store = open_store(data_dir)?;
    println!("{}", store.get_bookmark_count());
    Ok(())
}

/// Format and print a bookmark listing.
pub(crate) fn print_bookmarks(bookmarks: &[Bookmark], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => {
            if bookmarks.is_empty() {
                println!("No bookmarks.");
            } else {
                for bookmark in bookmarks {
                    println!("{}", bookmark_line(bookmark));
                }
                println!();
                println!("{} bookmark(s)", bookmarks.len());
            }
        }
        OutputFormat::Json => {
            let listings: Vec<BookmarkListing> =
                bookmarks.iter().map(BookmarkListing::from).collect();
            println!("{}", serde_json::to_string_pretty(&Output::new(listings))?);
        }
    }
    Ok(())
}
