//! One loaded schema document with its identifier and resolution scope.

use serde_json::Value;
use url::Url;

use crate::draft::{detect_draft, schema_id, Draft};
use crate::error::NormalizeError;
use crate::loader::Loader;
use crate::uri_util::{self, remove_fragment, remove_trailing_hash, resolve};

/// A parsed schema document, its fragment-free identifier, its draft, and
/// the stack of resolution scopes opened by nested identifier keywords.
///
/// Two files are the same file iff their identifiers are equal.
#[derive(Debug)]
pub struct SchemaFile {
    id: Url,
    content: Value,
    draft: Draft,
    scope: Vec<Url>,
}

impl SchemaFile {
    /// Wrap already-parsed content retrieved from `retrieval_id`. A string-
    /// valued top-level identifier keyword overrides the identifier after
    /// being resolved against the retrieval URI.
    pub fn new(content: Value, retrieval_id: Url) -> Result<Self, NormalizeError> {
        if !content.is_object() {
            return Err(NormalizeError::InvalidIdentifier {
                id: retrieval_id.to_string(),
                message: "document is not a JSON object".to_string(),
            });
        }
        let draft = detect_draft(&content);
        let mut id = remove_fragment(&retrieval_id);
        if let Some(declared) = schema_id(&content, draft) {
            if !declared.is_empty() {
                id = remove_fragment(&resolve(&id, declared)?);
            }
        }
        Ok(SchemaFile {
            id,
            content,
            draft,
            scope: Vec::new(),
        })
    }

    /// Fetch the document at `id` through `loader` and wrap it.
    pub fn load(id: Url, loader: &Loader) -> Result<Self, NormalizeError> {
        let content = loader.load(&id)?;
        Self::new(content, id)
    }

    pub fn id(&self) -> &Url {
        &self.id
    }

    pub fn draft(&self) -> Draft {
        self.draft
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    /// The current resolution scope: top of the stack, or the identifier
    /// when no scope has been opened.
    pub fn res_scope(&self) -> &Url {
        self.scope.last().unwrap_or(&self.id)
    }

    /// Open a scope. `None` or an empty identifier duplicates the current
    /// scope so that every exit can pop unconditionally; otherwise the
    /// declared identifier is resolved against the current scope and any
    /// trailing `#` is dropped.
    pub fn push_scope(&mut self, declared: Option<&str>) -> Result<(), NormalizeError> {
        let next = match declared {
            Some(s) if !s.trim().is_empty() => {
                remove_trailing_hash(&resolve(self.res_scope(), s)?)
            }
            _ => self.res_scope().clone(),
        };
        self.scope.push(next);
        Ok(())
    }

    /// Close the innermost scope.
    pub fn pop_scope(&mut self) {
        self.scope.pop();
    }

    /// Identifier rendered relative to `root` (see [`uri_util::rel_identifier`]).
    pub fn rel_identifier(&self, root: &Url) -> String {
        uri_util::rel_identifier(&self.id, root)
    }
}

impl PartialEq for SchemaFile {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl std::fmt::Display for SchemaFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}
