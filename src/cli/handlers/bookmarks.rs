//! Handlers for single-bookmark commands: add, rm, show.

use anyhow::{Result, bail};
use std::path::Path;

use super::{bookmark_line, format_date, open_store};
use crate::cli::output::{Output, OutputFormat};
use crate::cli::{AddArgs, RmArgs, ShowArgs};
use crate::domain::Bookmark;

pub fn handle_add(args: &AddArgs, data_dir: &Path) -> Result<()> {
    let store = open_store(data_dir)?;

    let mut bookmark = Bookmark::new(&args.title, args.url.clone());
    bookmark.category = args.category.clone();
    if !args.tags.is_empty() {
        bookmark.tags = Some(args.tags.clone());
    }

    let bookmark = store.add_bookmark(bookmark)?;
    match args.format {
        OutputFormat::Human => println!("Added {}: {}", bookmark.id, bookmark.title),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&Output::new(&bookmark))?)
        }
    }
    Ok(())
}

pub fn handle_rm(args: &RmArgs, data_dir: &Path) -> Result<()> {
    let store = open_store(data_dir)?;

    if store.get_bookmark(&args.id).is_none() {
        bail!("no bookmark with id: {}", args.id);
    }
    store.delete_bookmark(&args.id)?;
    println!("Removed {}", args.id);
    Ok(())
}

pub fn handle_show(args: &ShowArgs, data_dir: &Path) -> Result<()> {
    let store = open_store(data_dir)?;

    let Some(bookmark) = store.get_bookmark(&args.id) else {
        bail!("no bookmark with id: {}", args.id);
    };

    match args.format {
        OutputFormat::Human => print_bookmark(&bookmark),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&Output::new(&bookmark))?)
        }
    }
    Ok(())
}

fn print_bookmark(bookmark: &Bookmark) {
    println!("{}", bookmark_line(bookmark));
    if let Some(category) = &bookmark.category {
        println!("  category: {category}");
    }
    if !bookmark.tags().is_empty() {
        println!("  tags: {}", bookmark.tags().join(", "));
    }
    if let Some(parent) = &bookmark.parent_id {
        println!("  folder: {parent}");
    }
    println!("  added: {}", format_date(bookmark.date_added));
}
