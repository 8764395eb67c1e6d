//! In-memory fetcher for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::FetchError;
use crate::fetch::{CancelToken, Fetcher};

#[derive(Default)]
pub struct FakeFetcher {
    responses: Mutex<HashMap<String, Vec<u8>>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.respond(url, body);
        self
    }

    pub fn respond(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), body.into());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

impl Fetcher for FakeFetcher {
    fn get(&self, url: &str, cancel: &CancelToken) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled {
                url: url.to_string(),
            });
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Transport {
                url: url.to_string(),
                message: "network unreachable".to_string(),
            });
        }
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// A minimal detail page with an optional infobox image.
pub fn detail_page(lead: &str, image: Option<(&str, &str)>) -> String {
    let infobox = match image {
        Some((identity, src)) => format!(
            r#"<aside class="portable-infobox"><section>
<div class="pi-item pi-data"><h3 class="pi-data-label">Hand movement</h3>
<div class="pi-data-value"><img src="{src}" data-image-name="{identity}"></div></div>
<div class="pi-item pi-data"><h3 class="pi-data-label">Type</h3>
<div class="pi-data-value">Charm</div></div>
</section></aside>"#
        ),
        None => String::new(),
    };
    format!(
        r#"<html><body><div class="mw-parser-output">{infobox}
<p>Stub line.</p>
<p>{lead}</p>
</div></body></html>"#
    )
}
