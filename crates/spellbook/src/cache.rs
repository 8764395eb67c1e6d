use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use spellbook_core::{Config, ContentCache, Record};

use crate::render;

#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Print the cache directory
    Path,

    /// Remove one spell's cached page, or everything when no name is given
    Clear {
        /// Spell whose cached page should be removed
        name: Option<String>,
    },
}

pub fn execute(args: CacheArgs, config: &Config) -> Result<()> {
    match args.command {
        CacheCommand::Path => {
            println!("{}", config.cache_dir.display());
            Ok(())
        }
        CacheCommand::Clear { name } => clear(name, config),
    }
}

fn clear(name: Option<String>, config: &Config) -> Result<()> {
    let cache = ContentCache::from_config(config).context("Failed to set up HTTP client")?;

    let Some(name) = name else {
        let removed = cache.clear()?;
        println!("Removed {removed} cached files from {}", cache.root().display());
        return Ok(());
    };

    // Prefer the dataset's spelling so the key matches what `show` wrote.
    let record = render::load_store(config)
        .ok()
        .and_then(|store| store.find_by_name(&name).cloned())
        .unwrap_or_else(|| Record::new(name.trim(), "", None));

    if cache.invalidate(&record)? {
        println!("Removed cached page for {}", record.name);
    } else {
        println!("{} was not cached", record.name);
    }
    Ok(())
}
