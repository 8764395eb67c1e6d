//! Cross-group search: exact prefix plus approximate matching.
//!
//! Recomputed in full on every query; there is no incremental index.

use std::collections::HashSet;

use crate::records::{GroupedView, Record, RecordStore};
use crate::similarity::extract_top;

pub const DEFAULT_LIMIT: usize = 5;
pub const DEFAULT_CUTOFF: f64 = 65.0;

/// Filtered grouping for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult<'a> {
    pub grouped: GroupedView<'a>,
    /// First prefix match in letter then source order. Only meant for
    /// choosing which group to show; it is not a relevance ranking.
    pub primary: Option<&'a Record>,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchIndex {
    /// Approximate matches kept before the cutoff is applied.
    pub limit: usize,
    /// Minimum approximate score on the 0–100 scale.
    pub cutoff: f64,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            cutoff: DEFAULT_CUTOFF,
        }
    }
}

impl SearchIndex {
    pub fn filter<'a>(&self, query: &str, store: &'a RecordStore) -> SearchResult<'a> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return SearchResult {
                grouped: store.grouped(),
                primary: None,
            };
        }

        let records = store.records();
        let prefix: Vec<bool> = records
            .iter()
            .map(|r| r.name.to_lowercase().starts_with(&query))
            .collect();

        // Only the prefix test is case-insensitive; names are scored as written.
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        let approximate: HashSet<usize> = extract_top(&query, &names, self.limit, self.cutoff)
            .into_iter()
            .map(|(index, score)| {
                log::trace!("Approximate match {:?} scored {:.1}", records[index].name, score);
                index
            })
            .collect();

        let mut grouped = GroupedView::empty();
        for (index, record) in records.iter().enumerate() {
            if !prefix[index] && !approximate.contains(&index) {
                continue;
            }
            if let Some(letter) = record.initial() {
                grouped.push(letter, record);
            }
        }

        // Scan letters in order, then source order; approximate-only
        // matches never qualify.
        let primary = grouped
            .iter()
            .flat_map(|(_, group)| group.iter().copied())
            .find(|record| record.name.to_lowercase().starts_with(&query));

        log::debug!(
            "Query {:?}: {} matches, primary {:?}",
            query,
            grouped.total(),
            primary.map(|r| r.name.as_str())
        );
        SearchResult { grouped, primary }
    }
}

/// [`SearchIndex::filter`] with the default limit and cutoff.
pub fn filter<'a>(query: &str, store: &'a RecordStore) -> SearchResult<'a> {
    SearchIndex::default().filter(query, store)
}
