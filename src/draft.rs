//! Draft detection and the keyword rules that drive traversal.
//!
//! Drafts 04, 06, and 07 are supported. The only traversal-relevant
//! difference is the identifier keyword: Draft 4 uses `id`, later drafts
//! use `$id`. `enum` contents are instance data and are never descended.

use serde_json::Value;

use crate::error::NormalizeError;

/// Keyword holding a reference.
pub const REF_KEYWORD: &str = "$ref";

/// Keyword whose contents are opaque to traversal.
pub const OPAQUE_KEYWORD: &str = "enum";

/// Draft family of a schema document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Draft {
    /// Uses `id` as the identifier keyword.
    Draft4,
    /// Draft 6 and later; uses `$id`.
    DraftHigher,
}

impl Draft {
    /// The keyword that introduces a new resolution scope.
    pub fn id_keyword(&self) -> &'static str {
        match self {
            Draft::Draft4 => "id",
            Draft::DraftHigher => "$id",
        }
    }
}

/// Detect the draft family of `schema`.
pub fn detect_draft(schema: &Value) -> Draft {
    if validation_draft_number(schema) == 4 {
        Draft::Draft4
    } else {
        Draft::DraftHigher
    }
}

/// Draft version number used for meta-schema validation: 7 for draft-07,
/// 4 for draft-03/04, 6 for everything else. Documents without `$schema`
/// are sniffed: any `$id` outside an `enum` means draft 6, otherwise 4.
pub fn validation_draft_number(schema: &Value) -> u8 {
    if let Some(declared) = schema.get("$schema").and_then(Value::as_str) {
        if declared.contains("draft-07") {
            return 7;
        } else if declared.contains("draft-06") {
            return 6;
        } else if declared.contains("draft-04") || declared.contains("draft-03") {
            return 4;
        }
    }

    if contains_dollar_id(schema) {
        6
    } else {
        4
    }
}

fn contains_dollar_id(element: &Value) -> bool {
    match element {
        Value::Object(map) => {
            if map.contains_key("$id") {
                return true;
            }
            map.iter()
                .filter(|(key, _)| key.as_str() != OPAQUE_KEYWORD)
                .any(|(_, child)| contains_dollar_id(child))
        }
        Value::Array(items) => items.iter().any(contains_dollar_id),
        _ => false,
    }
}

/// The string value of the object's identifier keyword, if any.
pub fn schema_id<'a>(object: &'a Value, draft: Draft) -> Option<&'a str> {
    object.get(draft.id_keyword()).and_then(Value::as_str)
}

/// Remove every nested string-valued `id`/`$id`. The top-level object's own
/// identifier keyword is left in place; `enum` contents are never touched.
pub fn remove_nested_ids(object: &mut Value) {
    if let Value::Object(map) = object {
        for (key, child) in map.iter_mut() {
            if key != OPAQUE_KEYWORD {
                remove_ids_recursive(child);
            }
        }
    }
}

fn remove_ids_recursive(element: &mut Value) {
    match element {
        Value::Object(map) => {
            if map.get("$id").map(Value::is_string).unwrap_or(false) {
                map.remove("$id");
            } else if map.get("id").map(Value::is_string).unwrap_or(false) {
                map.remove("id");
            }
            for (key, child) in map.iter_mut() {
                if key != OPAQUE_KEYWORD {
                    remove_ids_recursive(child);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                remove_ids_recursive(item);
            }
        }
        _ => {}
    }
}

/// Validate `schema` against the meta-schema of its detected draft.
/// Documents without `$schema` are checked as Draft 4.
pub fn validate_to_declared_draft(schema: &Value) -> Result<(), NormalizeError> {
    let number = validation_draft_number(schema);
    let (name, meta_uri) = match number {
        7 => ("draft-07", "http://json-schema.org/draft-07/schema#"),
        6 => ("draft-06", "http://json-schema.org/draft-06/schema#"),
        _ => ("draft-04", "http://json-schema.org/draft-04/schema#"),
    };

    let Value::Object(map) = schema else {
        return Err(NormalizeError::DraftValidation {
            draft: name.to_string(),
            message: "document is not a JSON object".to_string(),
        });
    };

    // Pin the detected draft so documents with a missing or exotic
    // `$schema` are checked against the meta-schema detection selected.
    let mut pinned = map.clone();
    pinned.insert(
        "$schema".to_string(),
        Value::String(meta_uri.to_string()),
    );
    let pinned = Value::Object(pinned);

    match jsonschema::meta::validate(&pinned) {
        Ok(()) => Ok(()),
        Err(e) => Err(NormalizeError::DraftValidation {
            draft: name.to_string(),
            message: e.to_string(),
        }),
    }
}
