//! Core of the spellbook: an immutable spell dataset grouped by initial,
//! prefix-plus-fuzzy search over it, and a fetch-once cache of detail pages
//! parsed into lead paragraph and infobox attributes.

pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod harvest;
pub mod records;
pub mod search;
pub mod similarity;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use cache::{ContentCache, Detail};
pub use config::Config;
pub use error::{CacheError, FetchError, StoreError};
pub use extract::{AttributeValue, DetailDocument, ImageRef};
pub use fetch::{CancelToken, Fetcher, HttpFetcher};
pub use records::{GroupedView, Record, RecordStore};
pub use search::{SearchIndex, SearchResult};
pub use worker::{DetailResponse, DetailWorker};
