//! chromarx - local bookmark index and search

pub mod cli;
pub mod db;
pub mod domain;
pub mod infra;
pub mod kv;
pub mod store;
pub mod sync;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use cli::{
    Cli, Command,
    config::Config,
    handlers::{
        handle_add, handle_categories, handle_clear, handle_count, handle_list, handle_recent,
        handle_rm, handle_search, handle_show, handle_sync,
    },
};

/// Main entry point for the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load()?;
    let data_dir = config.data_dir(cli.data_dir.as_ref());
    let verbose = cli.verbose > 0;

    match &cli.command {
        Command::Add(args) => handle_add(args, &data_dir),
        Command::Rm(args) => handle_rm(args, &data_dir),
        Command::Show(args) => handle_show(args, &data_dir),
        Command::List(args) => handle_list(args, &data_dir),
        Command::Search(args) => handle_search(args, &data_dir),
        Command::Recent(args) => handle_recent(args, &data_dir),
        Command::Categories(args) => handle_categories(args, &data_dir),
        Command::Count => handle_count(&data_dir),
        Command::Sync(args) => handle_sync(args, &data_dir, &config, verbose),
        Command::Clear(args) => handle_clear(args, &data_dir),
        Command::Completions(args) => {
            clap_complete::generate(
                args.shell,
                &mut Cli::command(),
                "chromarx",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

/// Installs the log subscriber. `RUST_LOG` wins over the verbosity flags.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
