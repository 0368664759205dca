//! URL-keyed document cache with a persistent sidecar index.
//!
//! Remote schemas are written to a storage directory as `js_<n>.json` and
//! recorded in a CSV index of `local_name,url` rows. The index is read
//! top to bottom on lookup; deleting both the directory and the index
//! reinitializes the cache.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use url::Url;

use crate::error::CacheError;

/// Default storage directory next to the working directory.
pub const DEFAULT_DIR: &str = "Store";

/// Default sidecar index file.
pub const DEFAULT_INDEX: &str = "UriOfFiles.csv";

/// Disk-backed URL → JSON document store.
#[derive(Debug)]
pub struct FetchCache {
    dir: PathBuf,
    index: PathBuf,
    counter: usize,
}

impl FetchCache {
    /// Open a cache over `dir` with sidecar `index`. Nothing is touched on
    /// disk until the first [`store`](Self::store); the write counter resumes
    /// from the number of existing index rows.
    pub fn open(dir: impl Into<PathBuf>, index: impl Into<PathBuf>) -> Self {
        let index = index.into();
        let counter = fs::read_to_string(&index)
            .map(|content| content.lines().filter(|l| !l.trim().is_empty()).count())
            .unwrap_or(0);
        FetchCache {
            dir: dir.into(),
            index,
            counter,
        }
    }

    /// Look `url` up in the index and load the associated document.
    ///
    /// # Errors
    ///
    /// `CacheError::MissingIndex` if the index file does not exist,
    /// `CacheError::NotCached` if no row matches `url`.
    pub fn lookup(&self, url: &Url) -> Result<Value, CacheError> {
        if !self.index.exists() {
            return Err(CacheError::MissingIndex {
                path: self.index.clone(),
            });
        }

        let content = fs::read_to_string(&self.index)?;
        for line in content.lines() {
            let Some((name, stored_url)) = line.split_once(',') else {
                continue;
            };
            if stored_url == url.as_str() {
                let document = fs::read_to_string(self.dir.join(name))?;
                return Ok(serde_json::from_str(&document)?);
            }
        }

        Err(CacheError::NotCached {
            url: url.to_string(),
        })
    }

    /// Store `document` under a fresh `js_<n>.json` and append an index row.
    /// Documents with a `file` scheme are never stored.
    pub fn store(&mut self, document: &Value, url: &Url) -> Result<(), CacheError> {
        if url.scheme() == "file" {
            return Ok(());
        }

        fs::create_dir_all(&self.dir)?;
        let name = format!("js_{}.json", self.counter);
        let pretty = serde_json::to_string_pretty(document)?;
        fs::write(self.dir.join(&name), pretty)?;

        let mut index = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.index)?;
        writeln!(index, "{},{}", name, url)?;

        self.counter += 1;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

static GLOBAL: OnceLock<Mutex<FetchCache>> = OnceLock::new();

/// Process-wide cache at the default location. Writers must hold the lock
/// for the whole store operation so index rows and document files stay
/// consistent under concurrent normalization runs.
pub fn global_cache() -> &'static Mutex<FetchCache> {
    GLOBAL.get_or_init(|| Mutex::new(FetchCache::open(DEFAULT_DIR, DEFAULT_INDEX)))
}
