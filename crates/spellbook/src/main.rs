use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;
use spellbook_core::Config;
use std::path::PathBuf;

mod cache;
mod harvest;
mod list;
mod render;
mod search;
mod show;

#[derive(Parser)]
#[command(name = "spellbook")]
#[command(about = "Browse and search a spell reference", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    /// Spell dataset (JSON array of {name, description, link})
    #[arg(long, global = true, value_name = "PATH")]
    dataset: Option<PathBuf>,

    /// Directory holding cached detail pages and images
    #[arg(long, global = true, value_name = "PATH")]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List spells grouped by initial letter
    #[command(alias = "ls")]
    List(list::ListArgs),

    /// Search spell names by prefix and approximate match
    #[command(alias = "s")]
    Search(search::SearchArgs),

    /// Show the detail page of a spell
    Show(show::ShowArgs),

    /// Rebuild the dataset from the wiki's spell list
    Harvest(harvest::HarvestArgs),

    /// Inspect or clear the detail cache
    Cache(cache::CacheArgs),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "Error:".red());
        for cause in e.chain().skip(1) {
            eprintln!("  {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Default level depends on --debug (overridden by RUST_LOG)
    let env = if cli.debug {
        Env::default().default_filter_or("debug")
    } else {
        Env::default().default_filter_or("error")
    };
    env_logger::Builder::from_env(env).init();

    let mut config = Config::load()?;
    if let Some(dataset) = cli.dataset {
        config.dataset = dataset;
    }
    if let Some(cache_dir) = cli.cache_dir {
        config.cache_dir = cache_dir;
    }
    log::debug!("Using {config:?}");

    match cli.command {
        Commands::List(args) => list::execute(args, &config),
        Commands::Search(args) => search::execute(args, &config),
        Commands::Show(args) => show::execute(args, &config),
        Commands::Harvest(args) => harvest::execute(args, &config),
        Commands::Cache(args) => cache::execute(args, &config),
    }
}
