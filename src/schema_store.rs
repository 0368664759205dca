//! Per-normalization session state: the root file, every loaded file, and
//! the remote-loading policy.

use url::Url;

use crate::error::NormalizeError;
use crate::loader::Loader;
use crate::schema_file::SchemaFile;

/// Owns the files touched by one normalization run. Files are unique by
/// identifier and kept in first-insertion order, which is what makes the
/// naming of inlined definitions deterministic.
pub struct SchemaStore {
    root: Url,
    files: Vec<SchemaFile>,
    allow_remote: bool,
    loader: Loader,
}

impl SchemaStore {
    pub fn new(root_file: SchemaFile, allow_remote: bool, loader: Loader) -> Self {
        SchemaStore {
            root: root_file.id().clone(),
            files: vec![root_file],
            allow_remote,
            loader,
        }
    }

    /// Identifier of the top-level file.
    pub fn root(&self) -> &Url {
        &self.root
    }

    pub fn file(&self, index: usize) -> &SchemaFile {
        &self.files[index]
    }

    pub fn file_mut(&mut self, index: usize) -> &mut SchemaFile {
        &mut self.files[index]
    }

    pub fn is_root(&self, index: usize) -> bool {
        self.files[index].id() == &self.root
    }

    /// Index of the file with `identifier`, loading it if necessary.
    ///
    /// # Errors
    ///
    /// `DistributedSchema` when the file is not yet loaded and remote
    /// references are disallowed; `InvalidReference` when it cannot be
    /// obtained.
    pub fn get_or_load(&mut self, identifier: &Url) -> Result<usize, NormalizeError> {
        if let Some(index) = self.files.iter().position(|f| f.id() == identifier) {
            return Ok(index);
        }

        if !self.allow_remote {
            return Err(NormalizeError::DistributedSchema {
                id: identifier.to_string(),
            });
        }

        let file = SchemaFile::load(identifier.clone(), &self.loader).map_err(|e| match e {
            e @ NormalizeError::DistributedSchema { .. } => e,
            other => NormalizeError::InvalidReference {
                id: identifier.to_string(),
                message: other.to_string(),
            },
        })?;
        self.files.push(file);
        Ok(self.files.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{MemoryFetcher, RepositoryKind};
    use serde_json::json;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn store_with(allow_remote: bool, fetcher: MemoryFetcher) -> SchemaStore {
        let root = SchemaFile::new(json!({}), url("http://example.com/root.json")).unwrap();
        let loader = Loader::new(RepositoryKind::Normal)
            .with_fetcher(Box::new(fetcher))
            .without_cache();
        SchemaStore::new(root, allow_remote, loader)
    }

    #[test]
    fn root_file_is_preloaded() {
        let mut store = store_with(false, MemoryFetcher::new());
        let index = store.get_or_load(&url("http://example.com/root.json")).unwrap();
        assert_eq!(index, 0);
        assert!(store.is_root(index));
    }

    #[test]
    fn remote_disallowed_fails_with_distributed_schema() {
        let mut store = store_with(false, MemoryFetcher::new());
        assert!(matches!(
            store.get_or_load(&url("http://example.com/other.json")),
            Err(NormalizeError::DistributedSchema { .. })
        ));
    }

    #[test]
    fn remote_allowed_loads_and_dedupes() {
        let mut fetcher = MemoryFetcher::new();
        fetcher.insert("http://example.com/other.json", json!({"type": "string"}));
        let mut store = store_with(true, fetcher);

        let first = store.get_or_load(&url("http://example.com/other.json")).unwrap();
        let second = store.get_or_load(&url("http://example.com/other.json")).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.file(first).content()["type"], "string");
    }

    #[test]
    fn unobtainable_target_is_invalid_reference() {
        let mut store = store_with(true, MemoryFetcher::new());
        assert!(matches!(
            store.get_or_load(&url("http://example.com/missing.json")),
            Err(NormalizeError::InvalidReference { .. })
        ));
    }
}
