use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading the record dataset.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid record #{index} ({name:?}): {reason}")]
    InvalidRecord {
        index: usize,
        name: String,
        reason: &'static str,
    },

    #[error("Failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse dataset: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the network boundary.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },

    #[error("Request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} was cancelled")]
    Cancelled { url: String },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },
}

/// Errors from the detail cache.
///
/// A record without a link is not an error; see [`crate::cache::Detail::Unavailable`].
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to fetch page for {name}: {source}")]
    FetchFailed {
        name: String,
        #[source]
        source: FetchError,
    },

    #[error("Fetch for {name} was cancelled")]
    Cancelled { name: String },

    #[error("Cache storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Storage {
            path: path.into(),
            source,
        }
    }

    /// True for failures worth retrying on a later selection.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CacheError::FetchFailed { .. } | CacheError::Cancelled { .. })
    }
}
