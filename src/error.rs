//! Error types for schema normalization, caching, and recursion analysis.

use std::path::PathBuf;
use thiserror::Error;

/// Errors during schema normalization.
#[derive(Debug, Error)]
pub enum NormalizeError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    // Schema errors (exit code 2)
    #[error("schema with identifier {id} cannot be loaded: {message}")]
    InvalidIdentifier { id: String, message: String },

    #[error("fragment \"{fragment}\" does not resolve inside {id}")]
    InvalidFragment { fragment: String, id: String },

    #[error("reference target {id} cannot be obtained: {message}")]
    InvalidReference { id: String, message: String },

    #[error("schema has a ref which is pointing outside of the schema: {id}")]
    DistributedSchema { id: String },

    #[error("schema is not valid to {draft}: {message}")]
    DraftValidation { draft: String, message: String },
}

impl NormalizeError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound { .. } | Self::ReadError { .. } | Self::WriteError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors raised by the URL-keyed fetch cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("{path} does not exist")]
    MissingIndex { path: PathBuf },

    #[error("no file associated with {url} found in store")]
    NotCached { url: String },

    #[error("cannot access cache: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("cached document is not valid JSON: {source}")]
    InvalidJson {
        #[from]
        source: serde_json::Error,
    },
}

impl CacheError {
    /// A miss (as opposed to an IO or parse failure) means the caller
    /// should fall through to the network.
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::MissingIndex { .. } | Self::NotCached { .. })
    }
}

/// Errors during recursion classification of a normalized document.
#[derive(Debug, Error)]
pub enum RecursionError {
    #[error("document contains a non-local ref \"{reference}\"")]
    NonLocalRef { reference: String },

    #[error("pointer \"{pointer}\" does not resolve inside the document")]
    UnresolvedPointer { pointer: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_error_exit_codes() {
        let err = NormalizeError::FileNotFound {
            path: PathBuf::from("test.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = NormalizeError::DistributedSchema {
            id: "http://example.com/other.json".into(),
        };
        assert_eq!(err.exit_code(), 2);

        let err = NormalizeError::InvalidFragment {
            fragment: "foo".into(),
            id: "file:///tmp/a.json".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn cache_error_miss_detection() {
        assert!(CacheError::NotCached {
            url: "http://example.com/a.json".into()
        }
        .is_miss());
        assert!(CacheError::MissingIndex {
            path: PathBuf::from("UriOfFiles.csv")
        }
        .is_miss());

        let io = CacheError::Io {
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!io.is_miss());
    }
}
