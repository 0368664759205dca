//! Recursion classification over a normalized schema document.
//!
//! All references in the input are local JSON Pointers, so the reference
//! graph can be walked without any resolution context. A cycle whose every
//! edge is unguarded admits no finite instance; a guard is a keyword
//! crossing that lets the recursive branch be absent or finite (optional
//! property, `oneOf`/`anyOf` alternative, possibly-empty array, pattern or
//! additional schema).

use serde_json::Value;

use crate::error::RecursionError;
use crate::uri_util::{decode_pointer, encode_pointer, navigate_pointer};

/// Outcome of recursion analysis, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RecursionType {
    /// No reference cycle at all.
    None,
    /// Cycles exist, but every one crosses at least one guard.
    Guarded,
    /// Some cycle is reachable without crossing any guard.
    Recursion,
}

/// A reference target on the in-progress path. `guarded` records whether
/// the edge that entered it crossed a guard; identity is the pointer alone.
#[derive(Debug)]
struct Node {
    pointer: String,
    guarded: bool,
}

enum Stop {
    Unguarded,
    Error(RecursionError),
}

/// Walks the reference graph of a normalized document.
pub struct RecursionChecker<'a> {
    document: &'a Value,
}

impl<'a> RecursionChecker<'a> {
    pub fn new(document: &'a Value) -> Self {
        RecursionChecker { document }
    }

    /// Classify the document. The result is the maximum over all cycles
    /// found while exploring from the document root.
    pub fn check(&self) -> Result<RecursionType, RecursionError> {
        let mut stack = vec![Node {
            pointer: encode_pointer(&[]),
            guarded: false,
        }];
        let mut found_guarded = false;

        match self.visit(self.document, false, &mut stack, &mut found_guarded) {
            Ok(()) => Ok(if found_guarded {
                RecursionType::Guarded
            } else {
                RecursionType::None
            }),
            Err(Stop::Unguarded) => Ok(RecursionType::Recursion),
            Err(Stop::Error(e)) => Err(e),
        }
    }

    /// Structural walk carrying `guarded`: whether a guard has been crossed
    /// since the path entered the current reference target.
    fn visit(
        &self,
        value: &Value,
        guarded: bool,
        stack: &mut Vec<Node>,
        found_guarded: &mut bool,
    ) -> Result<(), Stop> {
        match value {
            Value::Object(map) => {
                if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                    self.follow_ref(reference, guarded, stack, found_guarded)?;
                }

                for (key, child) in map {
                    match key.as_str() {
                        // Instance data and inactive definitions; a definition
                        // participates only when a ref lands inside it.
                        "enum" | "definitions" | "$ref" => {}

                        "oneOf" | "anyOf" => {
                            if let Value::Array(items) = child {
                                for item in items {
                                    self.visit(item, true, stack, found_guarded)?;
                                }
                            } else {
                                self.visit(child, guarded, stack, found_guarded)?;
                            }
                        }

                        "properties" => {
                            let required = required_names(map);
                            if let Value::Object(props) = child {
                                for (name, sub) in props {
                                    let optional = !required.contains(&name.as_str());
                                    self.visit(sub, guarded || optional, stack, found_guarded)?;
                                }
                            }
                        }

                        "patternProperties" => {
                            if let Value::Object(props) = child {
                                for sub in props.values() {
                                    self.visit(sub, true, stack, found_guarded)?;
                                }
                            }
                        }

                        "additionalProperties" | "additionalItems" => {
                            self.visit(child, true, stack, found_guarded)?;
                        }

                        "items" => {
                            let min_items = map
                                .get("minItems")
                                .and_then(Value::as_u64)
                                .unwrap_or(0);
                            match child {
                                Value::Array(tuple) => {
                                    for (index, item) in tuple.iter().enumerate() {
                                        let forced = (index as u64) < min_items;
                                        self.visit(
                                            item,
                                            guarded || !forced,
                                            stack,
                                            found_guarded,
                                        )?;
                                    }
                                }
                                schema => {
                                    let may_be_empty = min_items == 0;
                                    self.visit(
                                        schema,
                                        guarded || may_be_empty,
                                        stack,
                                        found_guarded,
                                    )?;
                                }
                            }
                        }

                        // allOf, not, contains, dependencies, and anything
                        // else: no omission is admitted, guard state carries.
                        _ => self.visit(child, guarded, stack, found_guarded)?,
                    }
                }
                Ok(())
            }
            Value::Array(items) => {
                for item in items {
                    self.visit(item, guarded, stack, found_guarded)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn follow_ref(
        &self,
        reference: &str,
        guarded: bool,
        stack: &mut Vec<Node>,
        found_guarded: &mut bool,
    ) -> Result<(), Stop> {
        if !reference.starts_with('#') {
            return Err(Stop::Error(RecursionError::NonLocalRef {
                reference: reference.to_string(),
            }));
        }

        let tokens = decode_pointer(reference);
        let pointer = encode_pointer(&tokens);

        if let Some(position) = stack.iter().position(|n| n.pointer == pointer) {
            // Cycle closed. Its edges are the entries made after the first
            // occurrence of the target, plus the edge being followed now.
            let cycle_guarded =
                guarded || stack[position + 1..].iter().any(|n| n.guarded);
            if cycle_guarded {
                *found_guarded = true;
                return Ok(());
            }
            return Err(Stop::Unguarded);
        }

        let Some(target) = navigate_pointer(self.document, &tokens) else {
            return Err(Stop::Error(RecursionError::UnresolvedPointer { pointer }));
        };

        stack.push(Node { pointer, guarded });
        let result = self.visit(target, false, stack, found_guarded);
        stack.pop();
        result
    }
}

/// Convenience wrapper around [`RecursionChecker`].
pub fn check_recursion(document: &Value) -> Result<RecursionType, RecursionError> {
    RecursionChecker::new(document).check()
}

fn required_names(map: &serde_json::Map<String, Value>) -> Vec<&str> {
    map.get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}
