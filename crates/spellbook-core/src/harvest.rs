//! Build the spell dataset from the wiki's list page.

use anyhow::{Context, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::io::Write;
use std::path::Path;

use crate::fetch::{CancelToken, Fetcher};
use crate::records::{Record, validation_error};

static HEADLINES: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.mw-headline").expect("valid static selector"));
static LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("valid static selector"));

/// Fetch `list_url` and parse every spell heading on it.
pub fn harvest(fetcher: &dyn Fetcher, list_url: &str, base_url: &str) -> Result<Vec<Record>> {
    log::info!("Harvesting spell list from {list_url}");
    let body = fetcher
        .get(list_url, &CancelToken::new())
        .with_context(|| format!("Failed to fetch spell list {list_url}"))?;
    let records = parse_list_page(&String::from_utf8_lossy(&body), base_url);
    log::info!("Harvested {} spells", records.len());
    Ok(records)
}

/// Each `span.mw-headline` wrapping a link is one spell: the link text is the
/// name, its title the description, its href (joined to `base_url`) the link.
pub fn parse_list_page(html: &str, base_url: &str) -> Vec<Record> {
    let html = Html::parse_document(html);
    let base_url = base_url.trim_end_matches('/');

    let mut records = Vec::new();
    for headline in html.select(&HEADLINES) {
        let Some(anchor) = headline.select(&LINKS).next() else {
            continue;
        };
        let name: String = anchor.text().collect();
        let description = anchor.value().attr("title").unwrap_or_default();
        let link = anchor.value().attr("href").map(|href| {
            if href.starts_with("http://") || href.starts_with("https://") {
                href.to_string()
            } else {
                format!("{base_url}{href}")
            }
        });

        let record = Record::new(name.trim(), description, link.as_deref());
        if let Some(reason) = validation_error(&record) {
            log::warn!("Skipping {:?}: {}", record.name, reason);
            continue;
        }
        records.push(record);
    }
    records
}

/// Write `records` as pretty-printed JSON, replacing `path` atomically.
pub fn save_dataset(records: &[Record], path: &Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| f.write_all(&json))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote {} spells to {}", records.len(), path.display());
    Ok(())
}
