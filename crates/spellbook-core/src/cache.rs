//! Fetch-once detail cache.
//!
//! Layout under the cache root:
//!
//! ```text
//! <root>/pages/<key>.html    raw detail page per record
//! <root>/images/<identity>   image bytes, shared between records
//! <root>/.locks/<key>.lock   per-key fetch lock
//! ```
//!
//! Entries are written with an atomic rename, so readers and cancelled
//! writers never observe a partial file. Failures are never persisted.
//! Nothing expires; [`ContentCache::invalidate`] and [`ContentCache::clear`]
//! are the only ways an entry goes away, and neither touches files outside
//! `pages/` and `images/`.

use atomicwrites::{AtomicFile, OverwriteBehavior};
use deunicode::deunicode;
use fslock::LockFile;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::error::{CacheError, FetchError};
use crate::extract::{DetailDocument, ImageRef, ImageResolver, extract};
use crate::fetch::{CancelToken, Fetcher, HttpFetcher, strip_query};
use crate::records::Record;

const DETAIL_EXTENSION: &str = "html";
const PAGES_DIR: &str = "pages";
const IMAGES_DIR: &str = "images";
const LOCKS_DIR: &str = ".locks";
const LOCK_POLL: Duration = Duration::from_millis(20);

/// Outcome of a successful detail lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detail {
    Document(DetailDocument),
    /// The record has no link and nothing is cached: only the summary exists.
    Unavailable,
}

pub struct ContentCache {
    root: PathBuf,
    fetcher: Arc<dyn Fetcher>,
}

impl ContentCache {
    pub fn new(root: impl Into<PathBuf>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            root: root.into(),
            fetcher,
        }
    }

    /// Cache rooted at `config.cache_dir`, backed by the HTTP client.
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(config.timeout(), &config.user_agent)?;
        Ok(Self::new(&config.cache_dir, Arc::new(fetcher)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_path(&self, record: &Record) -> PathBuf {
        self.root
            .join(PAGES_DIR)
            .join(format!("{}.{DETAIL_EXTENSION}", sanitize(&record.name)))
    }

    pub fn image_path(&self, identity: &str) -> PathBuf {
        self.root.join(IMAGES_DIR).join(sanitize(identity))
    }

    pub fn is_cached(&self, record: &Record) -> bool {
        self.entry_path(record).is_file()
    }

    pub fn fetch_detail(&self, record: &Record) -> Result<Detail, CacheError> {
        self.fetch_detail_with(record, &CancelToken::new())
    }

    /// Like [`fetch_detail`](Self::fetch_detail), abandoning the fetch once
    /// `cancel` fires. A cancelled fetch writes nothing.
    pub fn fetch_detail_with(
        &self,
        record: &Record,
        cancel: &CancelToken,
    ) -> Result<Detail, CacheError> {
        let Some(raw) = self.load_or_fetch(record, cancel)? else {
            log::debug!("No link for {}; nothing to fetch", record.name);
            return Ok(Detail::Unavailable);
        };
        let images = CancellableImages {
            cache: self,
            cancel,
        };
        Ok(Detail::Document(extract(&raw, &images)))
    }

    fn load_or_fetch(
        &self,
        record: &Record,
        cancel: &CancelToken,
    ) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.entry_path(record);
        if let Some(raw) = read_entry(&path)? {
            log::debug!("Cache hit for {} at {}", record.name, path.display());
            return Ok(Some(raw));
        }

        let Some(link) = record.link.as_deref() else {
            return Ok(None);
        };

        let _lock = self.lock(&sanitize(&record.name), &record.name, cancel)?;
        // Another fetcher may have filled the entry while we waited.
        if let Some(raw) = read_entry(&path)? {
            log::debug!("Cache filled concurrently for {}", record.name);
            return Ok(Some(raw));
        }

        log::debug!("Cache miss for {}; fetching {}", record.name, link);
        let body = self.fetcher.get(link, cancel).map_err(|source| match source {
            FetchError::Cancelled { .. } => CacheError::Cancelled {
                name: record.name.clone(),
            },
            source => CacheError::FetchFailed {
                name: record.name.clone(),
                source,
            },
        })?;

        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled {
                name: record.name.clone(),
            });
        }

        write_atomic(&path, &body)?;
        log::info!("Cached {} ({} bytes)", record.name, body.len());
        Ok(Some(body))
    }

    /// Local path for the image `identity`, downloading `url` on first use.
    ///
    /// The cache is keyed by `identity`; `url` has its query string removed
    /// before use. Any failure degrades to [`ImageRef::Remote`].
    pub fn fetch_image(&self, identity: &str, url: &str) -> ImageRef {
        self.fetch_image_with(identity, url, &CancelToken::new())
    }

    fn fetch_image_with(&self, identity: &str, url: &str, cancel: &CancelToken) -> ImageRef {
        let url = strip_query(url);
        let path = self.image_path(identity);
        if path.is_file() {
            return ImageRef::Local(path);
        }

        match self.download_image(identity, &url, &path, cancel) {
            Ok(()) => ImageRef::Local(path),
            Err(e) => {
                log::warn!("Image download failed for {identity}: {e}");
                ImageRef::Remote(url)
            }
        }
    }

    fn download_image(
        &self,
        identity: &str,
        url: &str,
        path: &Path,
        cancel: &CancelToken,
    ) -> Result<(), CacheError> {
        let _lock = self.lock(&format!("image-{}", sanitize(identity)), identity, cancel)?;
        if path.is_file() {
            return Ok(());
        }

        let bytes = self
            .fetcher
            .get(url, cancel)
            .map_err(|source| CacheError::FetchFailed {
                name: identity.to_string(),
                source,
            })?;
        write_atomic(path, &bytes)?;
        log::info!("Saved image {}", path.display());
        Ok(())
    }

    /// Delete the cached page for `record`. Returns whether one existed.
    pub fn invalidate(&self, record: &Record) -> Result<bool, CacheError> {
        let path = self.entry_path(record);
        match fs::remove_file(&path) {
            Ok(()) => {
                log::info!("Invalidated cache entry for {}", record.name);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::storage(path, e)),
        }
    }

    /// Remove every cached page and image. Returns the number of files removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for entry in list_files(&self.root.join(PAGES_DIR))? {
            if entry.extension().is_some_and(|ext| ext == DETAIL_EXTENSION) {
                fs::remove_file(&entry).map_err(|e| CacheError::storage(&entry, e))?;
                removed += 1;
            }
        }
        for entry in list_files(&self.root.join(IMAGES_DIR))? {
            fs::remove_file(&entry).map_err(|e| CacheError::storage(&entry, e))?;
            removed += 1;
        }
        log::info!("Cleared {removed} cached files from {}", self.root.display());
        Ok(removed)
    }

    // Polls instead of blocking so a superseded request can give up while
    // another fetcher holds the key.
    fn lock(&self, key: &str, name: &str, cancel: &CancelToken) -> Result<LockFile, CacheError> {
        let dir = self.root.join(LOCKS_DIR);
        fs::create_dir_all(&dir).map_err(|e| CacheError::storage(&dir, e))?;
        let lock_path = dir.join(format!("{key}.lock"));
        let mut lock = LockFile::open(&lock_path).map_err(|e| lock_error(&lock_path, e))?;
        loop {
            if cancel.is_cancelled() {
                return Err(CacheError::Cancelled {
                    name: name.to_string(),
                });
            }
            if lock.try_lock().map_err(|e| lock_error(&lock_path, e))? {
                return Ok(lock);
            }
            thread::sleep(LOCK_POLL);
        }
    }
}

impl ImageResolver for ContentCache {
    fn resolve(&self, identity: &str, url: &str) -> ImageRef {
        self.fetch_image(identity, url)
    }
}

struct CancellableImages<'a> {
    cache: &'a ContentCache,
    cancel: &'a CancelToken,
}

impl ImageResolver for CancellableImages<'_> {
    fn resolve(&self, identity: &str, url: &str) -> ImageRef {
        self.cache.fetch_image_with(identity, url, self.cancel)
    }
}

/// Filesystem-safe cache key for a record name or image identity.
///
/// Keeps ASCII alphanumerics, `-`, `_` and `.`, transliterates other Unicode,
/// and replaces everything else with `_`. When that changes the input, a
/// short hash of the original is appended so distinct names stay distinct.
pub fn sanitize(name: &str) -> String {
    fn is_safe(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'
    }

    let ascii_cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii() && !is_safe(c) { '_' } else { c })
        .collect();
    let transliterated = deunicode(&ascii_cleaned);
    let all_safe: String = transliterated
        .chars()
        .map(|c| if is_safe(c) { c } else { '_' })
        .collect();

    let cleaned = all_safe
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    // Leading dots would hide the entry or escape the directory.
    let cleaned = cleaned.trim_start_matches('.').to_string();

    if cleaned == name && !cleaned.is_empty() {
        return cleaned;
    }

    let digest = Sha256::digest(name.as_bytes());
    let suffix: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    if cleaned.is_empty() {
        suffix
    } else {
        format!("{cleaned}-{suffix}")
    }
}

fn lock_error(path: &Path, err: impl std::fmt::Display) -> CacheError {
    CacheError::storage(path, io::Error::other(format!("Failed to lock: {err}")))
}

fn read_entry(path: &Path) -> Result<Option<Vec<u8>>, CacheError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CacheError::storage(path, e)),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CacheError::storage(parent, e))?;
    }
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| {
            f.write_all(bytes)?;
            f.flush()
        })
        .map_err(|err| match err {
            atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => {
                CacheError::storage(path, e)
            }
        })
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, CacheError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CacheError::storage(dir, e)),
    };
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CacheError::storage(dir, e))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::AttributeValue;
    use crate::test_support::{FakeFetcher, detail_page};
    use std::sync::atomic::{AtomicBool, Ordering};

    const ALOHOMORA_URL: &str = "https://example.com/wiki/Alohomora";

    fn alohomora() -> Record {
        Record::new("Alohomora", "Unlocking Charm", Some(ALOHOMORA_URL))
    }

    fn setup(fetcher: FakeFetcher) -> (tempfile::TempDir, Arc<FakeFetcher>, ContentCache) {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(fetcher);
        let cache = ContentCache::new(dir.path(), fetcher.clone());
        (dir, fetcher, cache)
    }

    fn lead(detail: Detail) -> String {
        match detail {
            Detail::Document(doc) => doc.lead_paragraph,
            Detail::Unavailable => panic!("expected a document"),
        }
    }

    #[test]
    fn test_second_fetch_is_served_from_disk_while_offline() {
        let (_dir, fetcher, cache) =
            setup(FakeFetcher::new().with(ALOHOMORA_URL, detail_page("Opens locks.", None)));

        let first = cache.fetch_detail(&alohomora()).unwrap();
        fetcher.set_offline(true);
        let second = cache.fetch_detail(&alohomora()).unwrap();

        assert_eq!(first, second);
        assert_eq!(lead(second), "Opens locks.");
        assert_eq!(fetcher.call_count(ALOHOMORA_URL), 1);
        assert!(cache.is_cached(&alohomora()));
    }

    #[test]
    fn test_failed_fetch_is_not_cached() {
        let (_dir, fetcher, cache) =
            setup(FakeFetcher::new().with(ALOHOMORA_URL, detail_page("Opens locks.", None)));
        fetcher.set_offline(true);

        let err = cache.fetch_detail(&alohomora()).unwrap_err();
        assert!(matches!(err, CacheError::FetchFailed { .. }));
        assert!(err.is_retryable());
        assert!(!cache.is_cached(&alohomora()));

        fetcher.set_offline(false);
        let detail = cache.fetch_detail(&alohomora()).unwrap();
        assert_eq!(lead(detail), "Opens locks.");
        assert_eq!(fetcher.call_count(ALOHOMORA_URL), 2);
    }

    #[test]
    fn test_error_status_is_fetch_failed() {
        let (_dir, _fetcher, cache) = setup(FakeFetcher::new());
        let err = cache.fetch_detail(&alohomora()).unwrap_err();
        match err {
            CacheError::FetchFailed {
                source: FetchError::Status { status, .. },
                ..
            } => assert_eq!(status, 404),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!cache.is_cached(&alohomora()));
    }

    #[test]
    fn test_record_without_link_is_unavailable() {
        let (_dir, fetcher, cache) = setup(FakeFetcher::new());
        let record = Record::new("Aguamenti", "Water-Making Spell", None);
        assert_eq!(cache.fetch_detail(&record).unwrap(), Detail::Unavailable);
        assert!(fetcher.calls().is_empty());
    }

    #[test]
    fn test_cancelled_fetch_leaves_no_entry() {
        let (_dir, _fetcher, cache) =
            setup(FakeFetcher::new().with(ALOHOMORA_URL, detail_page("Opens locks.", None)));
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = cache.fetch_detail_with(&alohomora(), &cancel).unwrap_err();
        assert!(matches!(err, CacheError::Cancelled { .. }));
        assert!(!cache.is_cached(&alohomora()));
        assert!(cache.fetch_detail(&alohomora()).is_ok());
    }

    #[test]
    fn test_shared_image_identity_is_downloaded_once() {
        let lumos_url = "https://example.com/wiki/Lumos";
        let image = "https://img.example/Wand.gif/revision/latest";
        let fetcher = FakeFetcher::new()
            .with(
                ALOHOMORA_URL,
                detail_page("Opens locks.", Some(("Wand.gif", &format!("{image}?cb=1")))),
            )
            .with(
                lumos_url,
                detail_page("Lights the wand.", Some(("Wand.gif", &format!("{image}?cb=2")))),
            )
            .with(image, b"GIF89a".to_vec());
        let (dir, fetcher, cache) = setup(fetcher);

        let first = cache.fetch_detail(&alohomora()).unwrap();
        let second = cache
            .fetch_detail(&Record::new("Lumos", "Wand-Lighting Charm", Some(lumos_url)))
            .unwrap();

        assert_eq!(fetcher.call_count(image), 1);
        let images: Vec<_> = fs::read_dir(dir.path().join(IMAGES_DIR)).unwrap().collect();
        assert_eq!(images.len(), 1);

        let expected = AttributeValue::Image {
            identity: "Wand.gif".to_string(),
            image: ImageRef::Local(cache.image_path("Wand.gif")),
        };
        for detail in [first, second] {
            let Detail::Document(doc) = detail else {
                panic!("expected a document");
            };
            assert_eq!(doc.attribute("Hand movement"), Some(&expected));
        }
    }

    #[test]
    fn test_image_failure_degrades_to_remote_url() {
        let (_dir, fetcher, cache) = setup(FakeFetcher::new());
        let image = cache.fetch_image("Missing.png", "https://img.example/Missing.png?cb=7");
        assert_eq!(
            image,
            ImageRef::Remote("https://img.example/Missing.png".to_string())
        );
        assert!(!cache.image_path("Missing.png").exists());

        // Not cached as a failure: a later call tries again.
        fetcher.respond("https://img.example/Missing.png", b"PNG".to_vec());
        let image = cache.fetch_image("Missing.png", "https://img.example/Missing.png?cb=8");
        assert_eq!(image, ImageRef::Local(cache.image_path("Missing.png")));
    }

    /// Holds every request until the gate opens.
    struct GatedFetcher {
        inner: FakeFetcher,
        open: AtomicBool,
    }

    impl Fetcher for GatedFetcher {
        fn get(&self, url: &str, cancel: &CancelToken) -> Result<Vec<u8>, FetchError> {
            while !self.open.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(5));
            }
            self.inner.get(url, cancel)
        }
    }

    #[test]
    fn test_concurrent_fetches_of_one_key_share_a_single_request() {
        let dir = tempfile::tempdir().unwrap();
        let gated = Arc::new(GatedFetcher {
            inner: FakeFetcher::new().with(ALOHOMORA_URL, detail_page("Opens locks.", None)),
            open: AtomicBool::new(false),
        });
        let cache = Arc::new(ContentCache::new(dir.path(), gated.clone()));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || cache.fetch_detail(&alohomora()))
            })
            .collect();
        // Let both threads reach the fetcher or the key lock.
        thread::sleep(Duration::from_millis(100));
        gated.open.store(true, Ordering::SeqCst);

        let results: Vec<Detail> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        assert_eq!(results[0], results[1]);
        assert_eq!(lead(results[0].clone()), "Opens locks.");
        assert_eq!(gated.inner.call_count(ALOHOMORA_URL), 1);
    }

    #[test]
    fn test_cancel_while_waiting_for_key_lock() {
        let (dir, fetcher, cache) =
            setup(FakeFetcher::new().with(ALOHOMORA_URL, detail_page("Opens locks.", None)));
        let cache = Arc::new(cache);

        // Another fetcher holds the key.
        let locks = dir.path().join(LOCKS_DIR);
        fs::create_dir_all(&locks).unwrap();
        let mut held = LockFile::open(&locks.join("Alohomora.lock")).unwrap();
        held.lock().unwrap();

        let cancel = CancelToken::new();
        let waiter = {
            let cache = cache.clone();
            let cancel = cancel.clone();
            thread::spawn(move || cache.fetch_detail_with(&alohomora(), &cancel))
        };
        thread::sleep(Duration::from_millis(60));
        cancel.cancel();

        let err = waiter.join().unwrap().unwrap_err();
        assert!(matches!(err, CacheError::Cancelled { .. }), "{err}");
        assert!(fetcher.calls().is_empty());
        assert!(!cache.is_cached(&alohomora()));
        held.unlock().unwrap();
    }

    #[test]
    fn test_invalidate_and_clear() {
        let (dir, fetcher, cache) =
            setup(FakeFetcher::new().with(ALOHOMORA_URL, detail_page("Opens locks.", None)));

        assert!(!cache.invalidate(&alohomora()).unwrap());
        cache.fetch_detail(&alohomora()).unwrap();
        assert!(cache.invalidate(&alohomora()).unwrap());
        assert!(!cache.is_cached(&alohomora()));

        cache.fetch_detail(&alohomora()).unwrap();
        assert_eq!(fetcher.call_count(ALOHOMORA_URL), 2);
        assert_eq!(
            cache.entry_path(&alohomora()),
            dir.path().join("pages").join("Alohomora.html")
        );

        // Only files the cache wrote are removed.
        let unrelated = dir.path().join("notes.html");
        fs::write(&unrelated, "<p>mine</p>").unwrap();
        assert_eq!(cache.clear().unwrap(), 1);
        assert!(!cache.is_cached(&alohomora()));
        assert!(unrelated.exists());
    }

    #[test]
    fn test_sanitize_keeps_safe_names_and_disambiguates_others() {
        assert_eq!(sanitize("Alohomora"), "Alohomora");
        assert_eq!(sanitize("Alohomora.gif"), "Alohomora.gif");

        let spaced = sanitize("Lumos Maxima");
        assert!(spaced.starts_with("Lumos_Maxima-"), "{spaced}");
        assert_eq!(spaced.len(), "Lumos_Maxima-".len() + 8);
        assert_ne!(sanitize("Lumos Maxima"), sanitize("Lumos/Maxima"));
        assert_eq!(sanitize("Lumos Maxima"), sanitize("Lumos Maxima"));

        let slashy = sanitize("../../etc/passwd");
        assert!(!slashy.contains('/'));
        assert!(!slashy.starts_with('.'));

        assert!(sanitize("Épouvantard").starts_with("Epouvantard-"));
        assert_eq!(sanitize("???").len(), 8);
    }
}
