use anyhow::Result;
use clap::Args;
use colored::Colorize;
use spellbook_core::search::{DEFAULT_CUTOFF, DEFAULT_LIMIT};
use spellbook_core::{Config, SearchIndex};

use crate::render;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Name or partial name to look for
    pub query: String,

    /// Maximum number of approximate matches
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,

    /// Minimum approximate match score (0-100)
    #[arg(long, default_value_t = DEFAULT_CUTOFF)]
    pub cutoff: f64,
}

pub fn execute(args: SearchArgs, config: &Config) -> Result<()> {
    let store = render::load_store(config)?;
    let index = SearchIndex {
        limit: args.limit,
        cutoff: args.cutoff,
    };
    let result = index.filter(&args.query, &store);

    if result.grouped.is_empty() {
        println!("No spells match {:?}", args.query.trim());
        return Ok(());
    }

    print!("{}", render::groups(&result.grouped));
    if let Some((letter, primary)) = result
        .primary
        .and_then(|record| Some((record.initial()?, record)))
    {
        println!("\n{} {letter} ({})", "Primary group:".green(), primary.name);
    }
    Ok(())
}
