//! Immutable record list and its by-initial grouping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::StoreError;

/// Letters every [`GroupedView`] carries, in display order.
pub const LETTERS: std::ops::RangeInclusive<char> = 'A'..='Z';

/// One reference entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_link")]
    pub link: Option<String>,
}

impl Record {
    pub fn new(name: impl Into<String>, description: impl Into<String>, link: Option<&str>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            link: link.map(str::to_string).filter(|l| !l.trim().is_empty()),
        }
    }

    /// Uppercase group letter, if the name starts with an ASCII letter.
    pub fn initial(&self) -> Option<char> {
        self.name
            .chars()
            .next()
            .filter(char::is_ascii_alphabetic)
            .map(|c| c.to_ascii_uppercase())
    }
}

// Harvested datasets carry `"link": ""` or `null` for records without a page.
fn deserialize_link<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|l| !l.trim().is_empty()))
}

/// Records partitioned by uppercase initial. All letters `A..=Z` are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedView<'a> {
    groups: BTreeMap<char, Vec<&'a Record>>,
}

impl<'a> GroupedView<'a> {
    pub(crate) fn empty() -> Self {
        Self {
            groups: LETTERS.map(|c| (c, Vec::new())).collect(),
        }
    }

    pub(crate) fn push(&mut self, letter: char, record: &'a Record) {
        self.groups.entry(letter).or_default().push(record);
    }

    /// Records for one letter (case-insensitive), empty for unknown letters.
    pub fn group(&self, letter: char) -> &[&'a Record] {
        self.groups
            .get(&letter.to_ascii_uppercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterate `(letter, records)` in letter order.
    pub fn iter(&self) -> impl Iterator<Item = (char, &[&'a Record])> {
        self.groups.iter().map(|(c, v)| (*c, v.as_slice()))
    }

    pub fn total(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Letters that have at least one record.
    pub fn non_empty_letters(&self) -> Vec<char> {
        self.iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(c, _)| c)
            .collect()
    }
}

/// Owns the canonical record list. Read-only after [`RecordStore::load`].
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    /// Validate and take ownership of `records`, preserving their order.
    pub fn load(records: impl IntoIterator<Item = Record>) -> Result<Self, StoreError> {
        let records: Vec<Record> = records.into_iter().collect();
        for (index, record) in records.iter().enumerate() {
            validate(index, record)?;
        }
        log::debug!("Loaded {} records", records.len());
        Ok(Self { records })
    }

    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        let records: Vec<Record> = serde_json::from_str(json)?;
        Self::load(records)
    }

    pub fn from_json_path(path: &Path) -> Result<Self, StoreError> {
        let contents = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Case-insensitive exact name lookup.
    pub fn find_by_name(&self, name: &str) -> Option<&Record> {
        let wanted = name.trim().to_lowercase();
        self.records
            .iter()
            .find(|r| r.name.to_lowercase() == wanted)
    }

    pub fn grouped(&self) -> GroupedView<'_> {
        let mut view = GroupedView::empty();
        for record in &self.records {
            // Validated at load, so every record has an initial.
            if let Some(letter) = record.initial() {
                view.push(letter, record);
            }
        }
        view
    }
}

/// Reason a record would be rejected by [`RecordStore::load`], if any.
pub fn validation_error(record: &Record) -> Option<&'static str> {
    if record.name.is_empty() {
        Some("name is empty")
    } else if record.initial().is_none() {
        Some("name must start with an ASCII letter")
    } else {
        None
    }
}

fn validate(index: usize, record: &Record) -> Result<(), StoreError> {
    match validation_error(record) {
        None => Ok(()),
        Some(reason) => Err(StoreError::InvalidRecord {
            index,
            name: record.name.clone(),
            reason,
        }),
    }
}
