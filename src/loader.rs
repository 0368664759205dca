//! Schema loading from files, the fetch cache, and HTTP.
//!
//! The loader is cache-first: a URL is looked up in the fetch cache, then
//! fetched over the network and stored. When the primary fetch fails, a
//! repository-kind specific fallback applies before the load is declared
//! failed.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;
use url::Url;

use crate::cache::{global_cache, FetchCache};
use crate::error::NormalizeError;

/// Default timeout for HTTP requests (30 seconds).
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// URL prefix remapped to a local directory for test-suite repositories.
const TESTSUITE_URL_PREFIX: &str = "http://localhost:1234/";

/// Default directory holding the test suite's remote documents.
pub const DEFAULT_TESTSUITE_REMOTES: &str = "TestSuiteDraft4/remotes";

/// Default query appended when re-issuing a corpus URL.
pub const DEFAULT_CORPUS_RAW_QUERY: &str = "raw=true";

/// How missing URLs are retried for a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepositoryKind {
    /// No fallback; a failed fetch surfaces as `InvalidIdentifier`.
    #[default]
    Normal,
    /// Re-issue the URL with a raw-content query (hosting convention).
    Corpus,
    /// Remap `http://localhost:1234/` to a local remotes directory.
    TestSuite,
}

/// Hook for obtaining a remote document. Implementations decide transport;
/// the loader owns caching and fallback policy.
pub trait SchemaFetcher {
    fn fetch(&self, url: &Url) -> Result<Value, NormalizeError>;
}

/// HTTP fetcher following redirects, with a fixed timeout.
#[derive(Debug, Default)]
pub struct HttpFetcher;

impl SchemaFetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<Value, NormalizeError> {
        let network_error = |e: reqwest::Error| NormalizeError::InvalidReference {
            id: url.to_string(),
            message: e.to_string(),
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(network_error)?;

        let response = client
            .get(url.as_str())
            .send()
            .map_err(network_error)?
            .error_for_status()
            .map_err(network_error)?;

        response.json().map_err(network_error)
    }
}

/// In-memory fetcher keyed by URL string. Used to drive normalization in
/// tests without network or filesystem contact.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    documents: HashMap<String, Value>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: &str, document: Value) {
        self.documents.insert(url.to_string(), document);
    }
}

impl SchemaFetcher for MemoryFetcher {
    fn fetch(&self, url: &Url) -> Result<Value, NormalizeError> {
        self.documents
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| NormalizeError::InvalidReference {
                id: url.to_string(),
                message: "document not available".to_string(),
            })
    }
}

enum CacheHandle {
    Global,
    Local(Mutex<FetchCache>),
    Off,
}

/// Cache-first schema loader with per-repository-kind fallbacks.
pub struct Loader {
    kind: RepositoryKind,
    fetcher: Box<dyn SchemaFetcher>,
    cache: CacheHandle,
    testsuite_remotes: PathBuf,
    corpus_raw_query: String,
}

impl Loader {
    /// Loader with the HTTP fetcher and the process-wide cache.
    pub fn new(kind: RepositoryKind) -> Self {
        Loader {
            kind,
            fetcher: Box::new(HttpFetcher),
            cache: CacheHandle::Global,
            testsuite_remotes: PathBuf::from(DEFAULT_TESTSUITE_REMOTES),
            corpus_raw_query: DEFAULT_CORPUS_RAW_QUERY.to_string(),
        }
    }

    /// Replace the transport hook.
    pub fn with_fetcher(mut self, fetcher: Box<dyn SchemaFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Use a private cache instead of the process-wide one.
    pub fn with_local_cache(mut self, cache: FetchCache) -> Self {
        self.cache = CacheHandle::Local(Mutex::new(cache));
        self
    }

    /// Disable caching entirely.
    pub fn without_cache(mut self) -> Self {
        self.cache = CacheHandle::Off;
        self
    }

    /// Directory the test-suite fallback reads from.
    pub fn with_testsuite_remotes(mut self, dir: impl Into<PathBuf>) -> Self {
        self.testsuite_remotes = dir.into();
        self
    }

    /// Query appended by the corpus fallback.
    pub fn with_corpus_raw_query(mut self, query: impl Into<String>) -> Self {
        self.corpus_raw_query = query.into();
        self
    }

    pub fn kind(&self) -> RepositoryKind {
        self.kind
    }

    /// Load the document at `id`. `file` URLs read the filesystem directly;
    /// everything else goes cache → network → fallback.
    pub fn load(&self, id: &Url) -> Result<Value, NormalizeError> {
        if id.scheme() == "file" {
            return self.load_file(id);
        }

        if let Some(document) = self.cached(id) {
            debug!("cache hit for {}", id);
            return Ok(document);
        }

        match self.fetcher.fetch(id) {
            Ok(document) => {
                self.store(&document, id);
                Ok(document)
            }
            Err(primary) => self.fallback(id, primary),
        }
    }

    fn load_file(&self, id: &Url) -> Result<Value, NormalizeError> {
        let path = id
            .to_file_path()
            .map_err(|_| NormalizeError::InvalidIdentifier {
                id: id.to_string(),
                message: "not a usable file URL".to_string(),
            })?;
        if !path.exists() {
            return Err(NormalizeError::FileNotFound { path });
        }
        let content = fs::read_to_string(&path).map_err(|source| NormalizeError::ReadError {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| NormalizeError::InvalidJson { source })
    }

    fn fallback(
        &self,
        id: &Url,
        primary: NormalizeError,
    ) -> Result<Value, NormalizeError> {
        match self.kind {
            RepositoryKind::TestSuite => {
                let Some(rest) = id.as_str().strip_prefix(TESTSUITE_URL_PREFIX) else {
                    return Err(cannot_load(id));
                };
                let path = self.testsuite_remotes.join(rest);
                let content = fs::read_to_string(&path).map_err(|_| cannot_load(id))?;
                let document: Value =
                    serde_json::from_str(&content).map_err(|_| NormalizeError::InvalidIdentifier {
                        id: id.to_string(),
                        message: "remapped document is not valid JSON".to_string(),
                    })?;
                self.store(&document, id);
                Ok(document)
            }
            RepositoryKind::Corpus => {
                let mut raw = id.clone();
                raw.set_query(Some(&self.corpus_raw_query));
                let document = self.fetcher.fetch(&raw).map_err(|_| cannot_load(id))?;
                // Stored under the original identifier, not the rewritten one.
                self.store(&document, id);
                Ok(document)
            }
            RepositoryKind::Normal => Err(NormalizeError::InvalidIdentifier {
                id: id.to_string(),
                message: primary.to_string(),
            }),
        }
    }

    fn cached(&self, id: &Url) -> Option<Value> {
        let lookup = |cache: &FetchCache| match cache.lookup(id) {
            Ok(document) => Some(document),
            Err(e) if e.is_miss() => None,
            Err(e) => {
                warn!("cache lookup for {} failed: {}", id, e);
                None
            }
        };
        match &self.cache {
            CacheHandle::Global => {
                let guard = global_cache().lock().ok()?;
                lookup(&guard)
            }
            CacheHandle::Local(cache) => {
                let guard = cache.lock().ok()?;
                lookup(&guard)
            }
            CacheHandle::Off => None,
        }
    }

    fn store(&self, document: &Value, id: &Url) {
        let store_in = |cache: &mut FetchCache| {
            if let Err(e) = cache.store(document, id) {
                warn!("cannot store {} in cache: {}", id, e);
            }
        };
        match &self.cache {
            CacheHandle::Global => {
                if let Ok(mut cache) = global_cache().lock() {
                    store_in(&mut cache);
                }
            }
            CacheHandle::Local(cache) => {
                if let Ok(mut cache) = cache.lock() {
                    store_in(&mut cache);
                }
            }
            CacheHandle::Off => {}
        }
    }
}

fn cannot_load(id: &Url) -> NormalizeError {
    NormalizeError::InvalidIdentifier {
        id: id.to_string(),
        message: "schema cannot be loaded".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn load_file_url() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("schema.json");
        fs::write(&path, r#"{"type": "object"}"#).unwrap();

        let loader = Loader::new(RepositoryKind::Normal).without_cache();
        let id = Url::from_file_path(&path).unwrap();
        assert_eq!(loader.load(&id).unwrap()["type"], "object");
    }

    #[test]
    fn load_missing_file_is_file_not_found() {
        let loader = Loader::new(RepositoryKind::Normal).without_cache();
        let id = url("file:///nonexistent/schema.json");
        assert!(matches!(
            loader.load(&id),
            Err(NormalizeError::FileNotFound { .. })
        ));
    }

    #[test]
    fn memory_fetcher_serves_documents() {
        let mut fetcher = MemoryFetcher::new();
        fetcher.insert("http://example.com/a.json", json!({"n": 1}));

        let loader = Loader::new(RepositoryKind::Normal)
            .with_fetcher(Box::new(fetcher))
            .without_cache();
        assert_eq!(loader.load(&url("http://example.com/a.json")).unwrap(), json!({"n": 1}));
    }

    #[test]
    fn normal_kind_surfaces_invalid_identifier() {
        let loader = Loader::new(RepositoryKind::Normal)
            .with_fetcher(Box::new(MemoryFetcher::new()))
            .without_cache();
        assert!(matches!(
            loader.load(&url("http://example.com/missing.json")),
            Err(NormalizeError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn corpus_kind_retries_with_raw_query() {
        let mut fetcher = MemoryFetcher::new();
        fetcher.insert("http://example.com/a.json?raw=true", json!({"raw": true}));

        let loader = Loader::new(RepositoryKind::Corpus)
            .with_fetcher(Box::new(fetcher))
            .without_cache();
        assert_eq!(
            loader.load(&url("http://example.com/a.json")).unwrap(),
            json!({"raw": true})
        );
    }

    #[test]
    fn corpus_raw_query_is_configurable() {
        let mut fetcher = MemoryFetcher::new();
        fetcher.insert("http://example.com/a.json?plain=1", json!({}));

        let loader = Loader::new(RepositoryKind::Corpus)
            .with_fetcher(Box::new(fetcher))
            .without_cache()
            .with_corpus_raw_query("plain=1");
        assert!(loader.load(&url("http://example.com/a.json")).is_ok());
    }

    #[test]
    fn testsuite_kind_remaps_localhost() {
        let tmp = TempDir::new().unwrap();
        let remotes = tmp.path().join("remotes");
        fs::create_dir_all(remotes.join("folder")).unwrap();
        fs::write(
            remotes.join("folder/integer.json"),
            r#"{"type": "integer"}"#,
        )
        .unwrap();

        let loader = Loader::new(RepositoryKind::TestSuite)
            .with_fetcher(Box::new(MemoryFetcher::new()))
            .without_cache()
            .with_testsuite_remotes(&remotes);
        let loaded = loader
            .load(&url("http://localhost:1234/folder/integer.json"))
            .unwrap();
        assert_eq!(loaded["type"], "integer");
    }

    #[test]
    fn cache_hit_avoids_fetcher() {
        let tmp = TempDir::new().unwrap();
        let mut cache = FetchCache::open(tmp.path().join("Store"), tmp.path().join("idx.csv"));
        let id = url("http://example.com/cached.json");
        cache.store(&json!({"cached": true}), &id).unwrap();

        // The fetcher knows nothing; only the cache can answer.
        let loader = Loader::new(RepositoryKind::Normal)
            .with_fetcher(Box::new(MemoryFetcher::new()))
            .with_local_cache(cache);
        assert_eq!(loader.load(&id).unwrap(), json!({"cached": true}));
    }

    #[test]
    fn fetched_documents_are_stored() {
        let tmp = TempDir::new().unwrap();
        let cache = FetchCache::open(tmp.path().join("Store"), tmp.path().join("idx.csv"));
        let id = url("http://example.com/a.json");

        let mut fetcher = MemoryFetcher::new();
        fetcher.insert(id.as_str(), json!({"fetched": true}));

        let loader = Loader::new(RepositoryKind::Normal)
            .with_fetcher(Box::new(fetcher))
            .with_local_cache(cache);
        loader.load(&id).unwrap();

        // A second loader over the same cache sees the stored copy.
        let reopened = FetchCache::open(tmp.path().join("Store"), tmp.path().join("idx.csv"));
        assert_eq!(reopened.lookup(&id).unwrap(), json!({"fetched": true}));
    }
}
