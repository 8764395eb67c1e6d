use anyhow::{Context, Result};
use clap::Args;
use indicatif::ProgressBar;
use serde::Serialize;
use spellbook_core::search::filter;
use spellbook_core::{Config, ContentCache, Detail, DetailDocument, DetailResponse, DetailWorker, Record};
use std::sync::Arc;
use std::time::Duration;

use crate::render;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Exact spell name (case-insensitive)
    pub name: String,

    /// Print the record and parsed page as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    #[serde(flatten)]
    record: &'a Record,
    detail: Option<&'a DetailDocument>,
}

pub fn execute(args: ShowArgs, config: &Config) -> Result<()> {
    let store = render::load_store(config)?;
    let Some(record) = store.find_by_name(&args.name) else {
        let suggestions: Vec<&str> = filter(&args.name, &store)
            .grouped
            .iter()
            .flat_map(|(_, records)| records.iter().map(|r| r.name.as_str()))
            .take(5)
            .collect();
        if suggestions.is_empty() {
            anyhow::bail!("No spell named {:?}", args.name);
        }
        anyhow::bail!(
            "No spell named {:?}. Did you mean: {}?",
            args.name,
            suggestions.join(", ")
        );
    };

    let cache = ContentCache::from_config(config).context("Failed to set up HTTP client")?;
    let resp = fetch_with_spinner(Arc::new(cache), record)?;
    let detail = resp
        .result
        .with_context(|| format!("Failed to load details for {}", record.name))?;

    let doc = match &detail {
        Detail::Document(doc) => Some(doc),
        Detail::Unavailable => None,
    };

    if args.json {
        let output = ShowOutput {
            record,
            detail: doc,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match doc {
        Some(doc) => print!("{}", render::document(record, doc)),
        None => {
            print!("{}", render::header(record));
            println!("\nNo detail page available for {}", record.name);
        }
    }
    Ok(())
}

fn fetch_with_spinner(cache: Arc<ContentCache>, record: &Record) -> Result<DetailResponse> {
    let mut worker = DetailWorker::spawn(cache);
    let id = worker.select(record);

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Loading {}", record.name));

    let resp = loop {
        match worker.recv_timeout(Duration::from_millis(100)) {
            Some(resp) if resp.id == id => break resp,
            Some(stale) => log::debug!("Ignoring stale response for {}", stale.name),
            None if !worker.is_running() => {
                spinner.finish_and_clear();
                anyhow::bail!("Detail worker stopped before answering");
            }
            None => {}
        }
    };
    spinner.finish_and_clear();
    Ok(resp)
}
