//! URI helpers for identifier resolution and JSON Pointer fragments.
//!
//! Resolution follows RFC 3986 via `url::Url`. Pointer fragments use the
//! RFC 6901 escapes (`~0` for `~`, `~1` for `/`) plus percent-encoding of
//! characters that are not valid inside a URI fragment.

use std::path::Path;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::error::NormalizeError;

/// Characters percent-encoded when a pointer is emitted as a `$ref` fragment.
/// `%` is included so that literal percent signs survive a decode round trip.
const FRAGMENT_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'%');

/// Parse `s` as an absolute URI. Spaces are percent-encoded by the parser.
pub fn to_uri(s: &str) -> Result<Url, NormalizeError> {
    Url::parse(s.trim()).map_err(|e| NormalizeError::InvalidIdentifier {
        id: s.to_string(),
        message: e.to_string(),
    })
}

/// Resolve `reference` against `base` per RFC 3986.
pub fn resolve(base: &Url, reference: &str) -> Result<Url, NormalizeError> {
    base.join(reference.trim())
        .map_err(|e| NormalizeError::InvalidIdentifier {
            id: reference.to_string(),
            message: e.to_string(),
        })
}

/// Return `u` without any fragment.
pub fn remove_fragment(u: &Url) -> Url {
    let mut stripped = u.clone();
    stripped.set_fragment(None);
    stripped
}

/// Return `u` without a trailing `#` (an empty fragment). A URI with no
/// fragment at all is returned unchanged, as is one with a non-empty fragment.
pub fn remove_trailing_hash(u: &Url) -> Url {
    if u.fragment() == Some("") {
        remove_fragment(u)
    } else {
        u.clone()
    }
}

/// Convert an absolute filesystem path to a `file://` URL.
pub fn file_url(path: &Path) -> Result<Url, NormalizeError> {
    let absolute = path
        .canonicalize()
        .map_err(|source| NormalizeError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
    Url::from_file_path(&absolute).map_err(|_| NormalizeError::InvalidIdentifier {
        id: path.display().to_string(),
        message: "path cannot be expressed as a file URL".to_string(),
    })
}

/// Escape one key for use as a JSON Pointer token inside a URI fragment.
pub fn escape_pointer_token(token: &str) -> String {
    let escaped = token.replace('~', "~0").replace('/', "~1");
    utf8_percent_encode(&escaped, FRAGMENT_SET).to_string()
}

/// Build a `#`-rooted pointer fragment from raw key tokens.
pub fn encode_pointer(tokens: &[String]) -> String {
    let mut out = String::from("#");
    for token in tokens {
        out.push('/');
        out.push_str(&escape_pointer_token(token));
    }
    out
}

/// Re-encode an already `~`-escaped pointer (as taken from a URI fragment,
/// percent-decoded) for emission inside a `$ref`. Tokens keep their RFC 6901
/// escapes; only percent-encoding is applied.
pub fn encode_fragment_pointer(pointer: &str) -> String {
    pointer
        .split('/')
        .map(|token| utf8_percent_encode(token, FRAGMENT_SET).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Percent-decode a raw URI fragment into a pointer string.
pub fn decode_fragment(fragment: &str) -> String {
    percent_decode_str(fragment).decode_utf8_lossy().into_owned()
}

/// Split a `#`-rooted (or bare) pointer into raw key tokens, undoing both
/// percent-encoding and the RFC 6901 escapes.
pub fn decode_pointer(pointer: &str) -> Vec<String> {
    let trimmed = pointer.strip_prefix('#').unwrap_or(pointer);
    let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed
        .split('/')
        .map(|token| {
            let decoded = percent_decode_str(token).decode_utf8_lossy();
            decoded.replace("~1", "/").replace("~0", "~")
        })
        .collect()
}

/// Walk `root` along decoded pointer tokens (object keys or array indices).
pub fn navigate_pointer<'a>(
    root: &'a serde_json::Value,
    tokens: &[String],
) -> Option<&'a serde_json::Value> {
    let mut current = root;
    for token in tokens {
        current = match current {
            serde_json::Value::Object(map) => map.get(token)?,
            serde_json::Value::Array(items) => items.get(token.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Render `id` relative to the *directory* of `root`. When scheme or
/// authority differ the absolute form is returned; otherwise the result is
/// a relative path such as `sub/other.json` or `../shared/common.json`.
pub fn rel_identifier(id: &Url, root: &Url) -> String {
    if id.scheme() != root.scheme() || id.authority() != root.authority() {
        return id.to_string();
    }

    let root_segments = decoded_path_segments(root);
    let id_segments = decoded_path_segments(id);

    // The base for relativization is the directory containing the root file.
    let base = if root_segments.is_empty() {
        &root_segments[..]
    } else {
        &root_segments[..root_segments.len() - 1]
    };

    let common = base
        .iter()
        .zip(id_segments.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..base.len() {
        parts.push("..".to_string());
    }
    parts.extend(id_segments[common..].iter().cloned());
    parts.join("/")
}

fn decoded_path_segments(u: &Url) -> Vec<String> {
    match u.path_segments() {
        Some(segments) => segments
            .filter(|s| !s.is_empty())
            .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_uri_encodes_spaces() {
        let u = to_uri("http://example.com/a b.json").unwrap();
        assert_eq!(u.as_str(), "http://example.com/a%20b.json");
    }

    #[test]
    fn to_uri_rejects_relative() {
        assert!(matches!(
            to_uri("sub/other.json"),
            Err(NormalizeError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn resolve_relative_reference() {
        let base = to_uri("file:///schemas/root.json").unwrap();
        let resolved = resolve(&base, "types/item.json").unwrap();
        assert_eq!(resolved.as_str(), "file:///schemas/types/item.json");
    }

    #[test]
    fn resolve_fragment_only_keeps_base() {
        let base = to_uri("file:///schemas/root.json").unwrap();
        let resolved = resolve(&base, "#/definitions/x").unwrap();
        assert_eq!(remove_fragment(&resolved).as_str(), "file:///schemas/root.json");
        assert_eq!(resolved.fragment(), Some("/definitions/x"));
    }

    #[test]
    fn trailing_hash_is_distinct_from_no_fragment() {
        let plain = to_uri("http://example.com/a.json").unwrap();
        let hashed = to_uri("http://example.com/a.json#").unwrap();
        assert_ne!(plain, hashed);
        assert_eq!(remove_trailing_hash(&hashed), plain);
        assert_eq!(remove_trailing_hash(&plain), plain);

        let real = to_uri("http://example.com/a.json#foo").unwrap();
        assert_eq!(remove_trailing_hash(&real), real);
    }

    #[test]
    fn pointer_token_escaping() {
        assert_eq!(escape_pointer_token("a/b"), "a~1b");
        assert_eq!(escape_pointer_token("a~b"), "a~0b");
        assert_eq!(escape_pointer_token("a b"), "a%20b");
        assert_eq!(escape_pointer_token("50%"), "50%25");
    }

    #[test]
    fn pointer_round_trip() {
        let tokens = vec![
            "definitions".to_string(),
            "a/b".to_string(),
            "c~d".to_string(),
            "e f".to_string(),
            "50%".to_string(),
        ];
        let encoded = encode_pointer(&tokens);
        assert_eq!(decode_pointer(&encoded), tokens);
    }

    #[test]
    fn decode_pointer_of_root() {
        assert!(decode_pointer("#").is_empty());
        assert!(decode_pointer("").is_empty());
    }

    #[test]
    fn fragment_pointer_keeps_rfc6901_escapes() {
        assert_eq!(encode_fragment_pointer("/a~1b/c"), "/a~1b/c");
        assert_eq!(encode_fragment_pointer("/a b"), "/a%20b");
    }

    #[test]
    fn rel_identifier_sibling_file() {
        let root = to_uri("file:///schemas/root.json").unwrap();
        let id = to_uri("file:///schemas/other.json").unwrap();
        assert_eq!(rel_identifier(&id, &root), "other.json");
    }

    #[test]
    fn rel_identifier_subdirectory_and_parent() {
        let root = to_uri("file:///schemas/root.json").unwrap();
        let sub = to_uri("file:///schemas/types/item.json").unwrap();
        assert_eq!(rel_identifier(&sub, &root), "types/item.json");

        let up = to_uri("file:///shared/common.json").unwrap();
        assert_eq!(rel_identifier(&up, &root), "../shared/common.json");
    }

    #[test]
    fn rel_identifier_foreign_authority_stays_absolute() {
        let root = to_uri("file:///schemas/root.json").unwrap();
        let remote = to_uri("http://example.com/schemas/a.json").unwrap();
        assert_eq!(rel_identifier(&remote, &root), "http://example.com/schemas/a.json");
    }

    #[test]
    fn rel_identifier_decodes_segments() {
        let root = to_uri("http://example.com/dir/root.json").unwrap();
        let id = to_uri("http://example.com/dir/a%20b.json").unwrap();
        assert_eq!(rel_identifier(&id, &root), "a b.json");
    }
}
