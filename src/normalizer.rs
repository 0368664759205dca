//! Schema normalization: resolve every reference, inline external files,
//! and rewrite refs to local pointers.
//!
//! The output is a single document equivalent to the distributed input:
//! every reachable external file sits under a top-level `definitions` map
//! keyed by its identifier relative to the root, every `$ref` is a local
//! JSON Pointer, and all nested identifier keywords are removed.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use url::Url;

use crate::draft::{remove_nested_ids, schema_id, Draft, OPAQUE_KEYWORD, REF_KEYWORD};
use crate::error::NormalizeError;
use crate::loader::{Loader, RepositoryKind};
use crate::schema_file::SchemaFile;
use crate::schema_store::SchemaStore;
use crate::uri_util::{
    decode_fragment, decode_pointer, encode_fragment_pointer, escape_pointer_token, file_url,
    navigate_pointer, remove_fragment, remove_trailing_hash, resolve,
};

/// Policy and configuration for one normalization run.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Whether references may leave the set of already loaded files.
    pub allow_remote: bool,
    /// Fallback behavior for URLs that fail to fetch.
    pub repository_kind: RepositoryKind,
    /// Directory backing the test-suite URL remap.
    pub testsuite_remotes: Option<PathBuf>,
    /// Query used by the corpus raw-content rewrite.
    pub corpus_raw_query: Option<String>,
}

impl NormalizeOptions {
    pub fn new(allow_remote: bool) -> Self {
        NormalizeOptions {
            allow_remote,
            repository_kind: RepositoryKind::Normal,
            testsuite_remotes: None,
            corpus_raw_query: None,
        }
    }

    pub fn repository_kind(mut self, kind: RepositoryKind) -> Self {
        self.repository_kind = kind;
        self
    }

    pub fn testsuite_remotes(mut self, dir: impl Into<PathBuf>) -> Self {
        self.testsuite_remotes = Some(dir.into());
        self
    }

    pub fn corpus_raw_query(mut self, query: impl Into<String>) -> Self {
        self.corpus_raw_query = Some(query.into());
        self
    }

    fn loader(&self) -> Loader {
        let mut loader = Loader::new(self.repository_kind);
        if let Some(dir) = &self.testsuite_remotes {
            loader = loader.with_testsuite_remotes(dir);
        }
        if let Some(query) = &self.corpus_raw_query {
            loader = loader.with_corpus_raw_query(query.clone());
        }
        loader
    }
}

/// Normalizes one schema. All loaded files and the inlined definitions live
/// for a single [`normalize`](Self::normalize) call.
pub struct Normalizer {
    store: SchemaStore,
    definitions: Map<String, Value>,
}

impl Normalizer {
    /// Normalizer for the schema in `path`, identified by its file URL.
    pub fn from_path(path: &Path, options: &NormalizeOptions) -> Result<Self, NormalizeError> {
        let id = file_url(path)?;
        let content = read_document(path)?;
        Self::from_value(content, id, options)
    }

    /// Normalizer for the schema in `path` under an explicit base
    /// identifier, e.g. the URL a corpus entry was collected from.
    pub fn from_path_with_id(
        path: &Path,
        id: Url,
        options: &NormalizeOptions,
    ) -> Result<Self, NormalizeError> {
        let content = read_document(path)?;
        Self::from_value(content, id, options)
    }

    /// Normalizer for already-parsed content.
    pub fn from_value(
        content: Value,
        id: Url,
        options: &NormalizeOptions,
    ) -> Result<Self, NormalizeError> {
        Self::with_loader(content, id, options.allow_remote, options.loader())
    }

    /// Normalizer with full control over loading. This is the hook used by
    /// tests to resolve remote identifiers without network or filesystem.
    pub fn with_loader(
        content: Value,
        id: Url,
        allow_remote: bool,
        loader: Loader,
    ) -> Result<Self, NormalizeError> {
        let root = SchemaFile::new(content, id)?;
        Ok(Normalizer {
            store: SchemaStore::new(root, allow_remote, loader),
            definitions: Map::new(),
        })
    }

    /// Produce the normalized document.
    pub fn normalize(mut self) -> Result<Value, NormalizeError> {
        let mut document = self.store.file(0).content().clone();
        self.walk(&mut document, 0)?;

        if !self.definitions.is_empty() {
            let root = document
                .as_object_mut()
                .expect("root content is an object");
            if !root.get("definitions").map(Value::is_object).unwrap_or(false) {
                root.insert("definitions".to_string(), Value::Object(Map::new()));
            }
            let defs = root
                .get_mut("definitions")
                .and_then(Value::as_object_mut)
                .expect("definitions is an object");
            for (key, value) in std::mem::take(&mut self.definitions) {
                defs.insert(key, value);
            }
        }

        remove_nested_ids(&mut document);
        Ok(document)
    }

    /// Depth-first traversal. `file` indexes the store file whose scope
    /// stack governs resolution at this point of the document.
    fn walk(&mut self, value: &mut Value, file: usize) -> Result<(), NormalizeError> {
        match value {
            Value::Object(_) => self.walk_object(value, file),
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.walk(item, file)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn walk_object(&mut self, value: &mut Value, file: usize) -> Result<(), NormalizeError> {
        let draft = self.store.file(file).draft();
        let declared = schema_id(value, draft).map(str::to_owned);
        self.store.file_mut(file).push_scope(declared.as_deref())?;

        let result = self.walk_object_inner(value, file);
        self.store.file_mut(file).pop_scope();
        result
    }

    fn walk_object_inner(&mut self, value: &mut Value, file: usize) -> Result<(), NormalizeError> {
        let map = value.as_object_mut().expect("walk_object takes objects");

        for (key, child) in map.iter_mut() {
            if key != OPAQUE_KEYWORD {
                self.walk(child, file)?;
            }
        }

        if let Some(reference) = map.get(REF_KEYWORD).and_then(Value::as_str).map(str::to_owned) {
            let rewritten = self.rewrite_ref(&reference, file)?;
            map.insert(REF_KEYWORD.to_string(), Value::String(rewritten));
        }

        Ok(())
    }

    /// Resolve `reference` against the current scope and rewrite it as a
    /// pointer into the normalized document, inlining the target file first
    /// when it is not loaded yet.
    fn rewrite_ref(&mut self, reference: &str, file: usize) -> Result<String, NormalizeError> {
        let scope = self.store.file(file).res_scope().clone();
        let resolved = resolve(&scope, reference)?;
        let base = remove_fragment(&resolved);
        let fragment = resolved.fragment().map(decode_fragment);

        let target = if base == *self.store.file(file).id() {
            file
        } else {
            let target = self.store.get_or_load(&base)?;
            self.ensure_inlined(target)?;
            target
        };

        let prefix = if self.store.is_root(target) {
            "#".to_string()
        } else {
            let rel = self.store.file(target).rel_identifier(self.store.root());
            format!("#/definitions/{}", escape_pointer_token(&rel))
        };

        match fragment.as_deref() {
            None | Some("") => Ok(prefix),
            Some(pointer) if pointer.starts_with('/') => {
                let tokens = decode_pointer(pointer);
                if navigate_pointer(self.store.file(target).content(), &tokens).is_none() {
                    return Err(NormalizeError::InvalidFragment {
                        fragment: pointer.to_string(),
                        id: self.store.file(target).id().to_string(),
                    });
                }
                Ok(format!("{}{}", prefix, encode_fragment_pointer(pointer)))
            }
            Some(name) => {
                let wanted = remove_trailing_hash(&resolved);
                let Some(tokens) = find_id_location(self.store.file(target), &wanted) else {
                    return Err(NormalizeError::InvalidFragment {
                        fragment: name.to_string(),
                        id: self.store.file(target).id().to_string(),
                    });
                };
                let mut rewritten = prefix;
                for token in &tokens {
                    rewritten.push('/');
                    rewritten.push_str(&escape_pointer_token(token));
                }
                Ok(rewritten)
            }
        }
    }

    /// Inline `target` under `definitions`, normalizing its content against
    /// its own top-level scope. A placeholder is inserted before the walk so
    /// reference cycles between files terminate; repeated refs to the same
    /// file inline it only once.
    fn ensure_inlined(&mut self, target: usize) -> Result<(), NormalizeError> {
        if self.store.is_root(target) {
            return Ok(());
        }

        let rel = self.store.file(target).rel_identifier(self.store.root());
        if self.definitions.contains_key(&rel) {
            return Ok(());
        }

        self.definitions.insert(rel.clone(), Value::Null);
        let mut copy = self.store.file(target).content().clone();
        self.walk(&mut copy, target)?;
        self.definitions.insert(rel, copy);
        Ok(())
    }
}

/// Locate the subschema of `file` whose identifier keyword resolves to
/// `wanted`, tracking scopes from the file's top level. When several
/// subschemas resolve to the same identifier, the last declaration wins.
/// Returns the raw key tokens of its location.
fn find_id_location(file: &SchemaFile, wanted: &Url) -> Option<Vec<String>> {
    let mut path = Vec::new();
    let mut found = None;
    search_id(
        file.content(),
        file.id(),
        file.draft(),
        wanted,
        &mut path,
        &mut found,
    );
    found
}

fn search_id(
    value: &Value,
    scope: &Url,
    draft: Draft,
    wanted: &Url,
    path: &mut Vec<String>,
    found: &mut Option<Vec<String>>,
) {
    match value {
        Value::Object(map) => {
            let mut here = scope.clone();
            if let Some(declared) = schema_id(value, draft) {
                if !declared.trim().is_empty() {
                    if let Ok(resolved) = scope.join(declared.trim()) {
                        here = remove_trailing_hash(&resolved);
                        if here == *wanted {
                            *found = Some(path.clone());
                        }
                    }
                }
            }
            for (key, child) in map {
                if key == OPAQUE_KEYWORD {
                    continue;
                }
                path.push(key.clone());
                search_id(child, &here, draft, wanted, path, found);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                path.push(index.to_string());
                search_id(item, scope, draft, wanted, path, found);
                path.pop();
            }
        }
        _ => {}
    }
}

fn read_document(path: &Path) -> Result<Value, NormalizeError> {
    if !path.exists() {
        return Err(NormalizeError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = fs::read_to_string(path).map_err(|source| NormalizeError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| NormalizeError::InvalidJson { source })
}
