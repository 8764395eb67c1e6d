use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::Table;
use spellbook_core::{AttributeValue, Config, DetailDocument, GroupedView, ImageRef, Record, RecordStore};
use std::fmt::Write;

pub fn load_store(config: &Config) -> Result<RecordStore> {
    RecordStore::from_json_path(&config.dataset).with_context(|| {
        format!(
            "Failed to load spells from {} (run `spellbook harvest` to create it)",
            config.dataset.display()
        )
    })
}

/// One block per letter: a header, then name and description columns.
pub fn group(letter: char, records: &[&Record]) -> String {
    let width = records
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = format!("{} ({})\n", letter.to_string().bold(), records.len());
    for record in records {
        let line = format!("  {:<width$}  {}", record.name, record.description.dimmed());
        let _ = writeln!(out, "{}", line.trim_end());
    }
    out
}

/// Non-empty groups separated by blank lines.
pub fn groups(view: &GroupedView) -> String {
    view.iter()
        .filter(|(_, records)| !records.is_empty())
        .map(|(letter, records)| group(letter, records))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn attribute_value(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Text(text) => text.clone(),
        AttributeValue::Image { identity, image } => match image {
            ImageRef::Local(path) => format!("{identity} ({})", path.display()),
            ImageRef::Remote(url) => format!("{identity} ({url})"),
        },
    }
}

pub fn document(record: &Record, doc: &DetailDocument) -> String {
    let mut out = header(record);
    if !doc.lead_paragraph.is_empty() {
        let _ = writeln!(out, "\n{}", doc.lead_paragraph);
    }
    if !doc.attributes().is_empty() {
        let mut table = Table::new();
        table
            .load_preset(comfy_table::presets::UTF8_BORDERS_ONLY)
            .set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
        for (label, value) in doc.attributes() {
            table.add_row(vec![label.clone(), attribute_value(value)]);
        }
        let _ = writeln!(out, "\n{table}");
    }
    out
}

pub fn header(record: &Record) -> String {
    let mut out = format!("{}\n", record.name.bold());
    if !record.description.is_empty() {
        let _ = writeln!(out, "{}", record.description.dimmed());
    }
    out
}
