//! Background detail fetching.
//!
//! The caller selects records; a single worker thread resolves them through
//! the [`ContentCache`]. Selecting a new record cancels the one in flight and
//! queued selections collapse to the newest, so only the latest pick costs a
//! network round trip.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::cache::{ContentCache, Detail};
use crate::error::CacheError;
use crate::fetch::CancelToken;
use crate::records::Record;

#[derive(Debug)]
pub struct DetailRequest {
    pub id: u64,
    pub record: Record,
    cancel: CancelToken,
}

#[derive(Debug)]
pub struct DetailResponse {
    pub id: u64,
    pub name: String,
    pub result: Result<Detail, CacheError>,
}

pub struct DetailWorker {
    req_tx: Option<Sender<DetailRequest>>,
    resp_rx: Receiver<DetailResponse>,
    handle: Option<JoinHandle<()>>,
    next_id: u64,
    current: Option<CancelToken>,
}

impl DetailWorker {
    pub fn spawn(cache: Arc<ContentCache>) -> Self {
        let (req_tx, req_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        let handle = spawn_detail_worker(cache, req_rx, resp_tx);
        Self {
            req_tx: Some(req_tx),
            resp_rx,
            handle: Some(handle),
            next_id: 0,
            current: None,
        }
    }

    /// Queue `record` for resolution, superseding any earlier selection.
    /// Returns the id its response will carry.
    pub fn select(&mut self, record: &Record) -> u64 {
        if let Some(previous) = self.current.take() {
            previous.cancel();
        }
        self.next_id += 1;
        let cancel = CancelToken::new();
        self.current = Some(cancel.clone());

        let request = DetailRequest {
            id: self.next_id,
            record: record.clone(),
            cancel,
        };
        if let Some(tx) = &self.req_tx {
            if tx.send(request).is_err() {
                log::warn!("Detail worker has exited; dropping request for {}", record.name);
            }
        }
        self.next_id
    }

    /// Id of the most recent selection, if any.
    pub fn latest(&self) -> Option<u64> {
        (self.next_id > 0).then_some(self.next_id)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn try_recv(&self) -> Option<DetailResponse> {
        self.resp_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next response. `None` on timeout or if
    /// the worker has gone away.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<DetailResponse> {
        match self.resp_rx.recv_timeout(timeout) {
            Ok(resp) => Some(resp),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                log::debug!("Detail worker disconnected");
                None
            }
        }
    }
}

impl Drop for DetailWorker {
    fn drop(&mut self) {
        if let Some(cancel) = self.current.take() {
            cancel.cancel();
        }
        // Closing the request channel ends the worker loop.
        self.req_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Detail worker panicked");
            }
        }
    }
}

fn spawn_detail_worker(
    cache: Arc<ContentCache>,
    req_rx: Receiver<DetailRequest>,
    resp_tx: Sender<DetailResponse>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(mut req) = req_rx.recv() {
            // Coalesce rapid selection changes - keep only the latest request
            while let Ok(next) = req_rx.try_recv() {
                req = next;
            }
            if req.cancel.is_cancelled() {
                continue;
            }

            let result = cache.fetch_detail_with(&req.record, &req.cancel);
            if req.cancel.is_cancelled() {
                log::debug!("Dropping superseded detail for {}", req.record.name);
                continue;
            }

            let resp = DetailResponse {
                id: req.id,
                name: req.record.name,
                result,
            };
            if resp_tx.send(resp).is_err() {
                break;
            }
        }
    })
}
