use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use indicatif::ProgressBar;
use spellbook_core::harvest::{harvest, save_dataset};
use spellbook_core::{Config, HttpFetcher};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct HarvestArgs {
    /// Where to write the dataset (defaults to the configured dataset path)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

pub fn execute(args: HarvestArgs, config: &Config) -> Result<()> {
    let output = args.output.unwrap_or_else(|| config.dataset.clone());
    let fetcher = HttpFetcher::new(config.timeout(), &config.user_agent)
        .context("Failed to set up HTTP client")?;

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Fetching {}", config.list_url));
    let records = harvest(&fetcher, &config.list_url, &config.base_url);
    spinner.finish_and_clear();
    let records = records?;

    if records.is_empty() {
        anyhow::bail!("No spells found on {}", config.list_url);
    }

    save_dataset(&records, &output)?;
    println!(
        "{} {} spells to {}",
        "Saved".green(),
        records.len(),
        output.display()
    );
    Ok(())
}
