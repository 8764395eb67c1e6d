//! Network boundary: a single GET per cache miss.

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::FetchError;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Largest body accepted from the network. Detail pages and infobox images
/// are well under this.
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

// Content-Length is only a hint for the initial reservation.
const MAX_PREALLOC: usize = 1024 * 1024;

/// Shared flag a newer selection flips to abandon an older fetch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Retrieves the body of a URL. Implementations must not retry.
pub trait Fetcher: Send + Sync {
    fn get(&self, url: &str, cancel: &CancelToken) -> Result<Vec<u8>, FetchError>;
}

impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    fn get(&self, url: &str, cancel: &CancelToken) -> Result<Vec<u8>, FetchError> {
        (**self).get(url, cancel)
    }
}

/// Blocking reqwest client.
pub struct HttpFetcher {
    client: Client,
    max_body: usize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        let agent = HeaderValue::from_str(user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT));
        headers.insert(USER_AGENT, agent);
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,image/*,*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            max_body: DEFAULT_MAX_BODY_BYTES,
        })
    }

    /// Reject bodies larger than `limit` bytes with [`FetchError::TooLarge`].
    pub fn with_max_body(mut self, limit: usize) -> Self {
        self.max_body = limit;
        self
    }
}

impl Fetcher for HttpFetcher {
    fn get(&self, url: &str, cancel: &CancelToken) -> Result<Vec<u8>, FetchError> {
        let cancelled = || FetchError::Cancelled {
            url: url.to_string(),
        };
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let too_large = || FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_body,
        };
        let declared = response.content_length().unwrap_or(0);
        if declared > self.max_body as u64 {
            return Err(too_large());
        }

        let mut body = Vec::with_capacity((declared as usize).min(MAX_PREALLOC));
        let mut buffer = [0u8; 8192];
        loop {
            if cancel.is_cancelled() {
                return Err(cancelled());
            }
            let bytes_read = response
                .read(&mut buffer)
                .map_err(|e| FetchError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            if bytes_read == 0 {
                break;
            }
            if body.len() + bytes_read > self.max_body {
                return Err(too_large());
            }
            body.extend_from_slice(&buffer[..bytes_read]);
        }

        log::debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

/// Drop the query string and fragment from `url`.
///
/// Inputs that do not parse as absolute URLs are cut at the first `?`.
pub fn strip_query(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    }
}
