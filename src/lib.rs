//! Distributed JSON Schema normalization and recursion analysis.
//!
//! A schema spread over several files and URLs via `$ref` is *normalized*
//! into one self-contained document: every reachable external file is
//! inlined under a top-level `definitions` map and every reference becomes
//! a local JSON Pointer, preserving validation semantics for drafts 04, 06,
//! and 07. The normalized form is then classified for recursion: `None`,
//! `Guarded` (every cycle crosses a branch that may legally be absent), or
//! `Recursion` (some cycle admits no finite instance).
//!
//! # Example
//!
//! ```
//! use schema_norm::{check_recursion, NormalizeOptions, Normalizer, RecursionType};
//! use serde_json::json;
//! use url::Url;
//!
//! let schema = json!({
//!     "definitions": {
//!         "node": {
//!             "properties": { "next": { "$ref": "#/definitions/node" } }
//!         }
//!     },
//!     "allOf": [{ "$ref": "#/definitions/node" }]
//! });
//!
//! let id = Url::parse("file:///schemas/list.json").unwrap();
//! let options = NormalizeOptions::new(false);
//! let normalized = Normalizer::from_value(schema, id, &options)
//!     .and_then(Normalizer::normalize)
//!     .unwrap();
//!
//! // "next" is optional, so the recursion is guarded.
//! assert_eq!(check_recursion(&normalized).unwrap(), RecursionType::Guarded);
//! ```
//!
//! # Remote references
//!
//! External files are fetched through a process-wide URL cache (directory
//! `Store/`, sidecar index `UriOfFiles.csv`) and, on a miss, over HTTP.
//! Loading is policy-controlled: with `allow_remote` off, any ref leaving
//! the document fails with [`NormalizeError::DistributedSchema`].

mod analysis;
mod cache;
mod corpus;
mod draft;
mod error;
mod loader;
mod normalizer;
mod recursion;
mod schema_file;
mod schema_store;
mod uri_util;

pub use analysis::{
    analyse_dir, analyse_recursion, count_rows_json, detailed_stats, normalized_file_name,
    write_pretty, AnalysisSummary, ReportRow, StatsReport, REPORT_HEADER,
};
pub use cache::{global_cache, FetchCache, DEFAULT_DIR, DEFAULT_INDEX};
pub use corpus::analyse_corpus;
pub use draft::{detect_draft, validate_to_declared_draft, Draft};
pub use error::{CacheError, NormalizeError, RecursionError};
pub use loader::{
    HttpFetcher, Loader, MemoryFetcher, RepositoryKind, SchemaFetcher,
    DEFAULT_CORPUS_RAW_QUERY, DEFAULT_TESTSUITE_REMOTES,
};
pub use normalizer::{NormalizeOptions, Normalizer};
pub use recursion::{check_recursion, RecursionChecker, RecursionType};
pub use schema_file::SchemaFile;
pub use schema_store::SchemaStore;
