//! CLI command definitions and handlers

pub mod config;
pub mod handlers;
pub mod output;

use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use output::OutputFormat;

/// chromarx - local bookmark index and search
#[derive(Parser, Debug)]
#[command(name = "chromarx", version, about, long_about = None)]
pub struct Cli {
    /// Data directory (overrides config file)
    #[arg(short = 'd', long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a bookmark
    Add(AddArgs),

    /// Remove a bookmark by id
    Rm(RmArgs),

    /// Show a bookmark's full record
    Show(ShowArgs),

    /// List bookmarks, newest first
    #[command(name = "ls")]
    List(ListArgs),

    /// Search bookmarks by relevance
    Search(SearchArgs),

    /// Show the most recently added bookmarks
    Recent(RecentArgs),

    /// List all known categories
    Categories(CategoriesArgs),

    /// Print the number of stored bookmarks
    Count,

    /// Import bookmarks from a Chrome-format bookmark file
    Sync(SyncArgs),

    /// Delete all stored bookmarks
    Clear(ClearArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `add` command
#[derive(Parser, Debug)]
pub struct AddArgs {
    /// Bookmark title
    pub title: String,

    /// Page URL
    pub url: Option<String>,

    /// Category for the bookmark
    #[arg(short, long)]
    pub category: Option<String>,

    /// Tag for the bookmark (can be specified multiple times)
    #[arg(short, long = "tag", action = ArgAction::Append)]
    pub tags: Vec<String>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}

/// Arguments for the `rm` command
#[derive(Parser, Debug)]
pub struct RmArgs {
    /// Bookmark id
    pub id: String,
}

/// Arguments for the `show` command
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Bookmark id
    pub id: String,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}

/// Arguments for the `ls` (list) command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Maximum number of bookmarks to show
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Number of bookmarks to skip
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}

/// Sort field for the `search` command
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum SortField {
    /// Relevance score
    #[default]
    Relevance,
    /// Title, alphabetically
    Title,
    /// Date added
    Date,
    /// Category name
    Category,
}

/// Arguments for the `search` command
#[derive(Parser, Debug)]
pub struct SearchArgs {
    /// Search query (may be empty when --category is given)
    #[arg(default_value = "")]
    pub query: String,

    /// Restrict results to an exact category
    #[arg(short, long)]
    pub category: Option<String>,

    /// Maximum number of results
    #[arg(short, long, default_value_t = 50)]
    pub limit: usize,

    /// Number of results to skip
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Sort field
    #[arg(short, long, value_enum, default_value_t = SortField::Relevance)]
    pub sort: SortField,

    /// Sort ascending instead of descending
    #[arg(long)]
    pub asc: bool,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}

/// Arguments for the `recent` command
#[derive(Parser, Debug)]
pub struct RecentArgs {
    /// Number of bookmarks to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}

/// Arguments for the `categories` command
#[derive(Parser, Debug)]
pub struct CategoriesArgs {
    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,
}

/// Arguments for the `sync` command
#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// Path to a Chrome-format Bookmarks file (overrides config)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Drop all stored bookmarks and re-import from scratch
    #[arg(long)]
    pub force: bool,

    /// Bookmarks persisted per batch
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,
}

/// Arguments for the `clear` command
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Confirm the deletion
    #[arg(long)]
    pub yes: bool,
}

/// Arguments for the `completions` command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for (bash, zsh, fish)
    #[arg(value_enum)]
    pub shell: Shell,
}
