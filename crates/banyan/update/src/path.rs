//! Dot-notation path resolution over JSON values.
//!
//! Paths like `a.b.2.c` address nested fields; components made of digits
//! index arrays. Write access creates missing intermediates: objects for
//! name components, arrays (padded with nulls) for index components.

use crate::error::{UpdateError, UpdateResult};
use serde_json::{Map, Value};

/// One component of a dot-notation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Segment {
    pub(crate) name: String,
    pub(crate) index: Option<usize>,
}

impl Segment {
    fn new(raw: &str) -> Self {
        Segment {
            name: raw.to_string(),
            index: raw.parse::<usize>().ok(),
        }
    }
}

pub(crate) fn parse_path(path: &str) -> UpdateResult<Vec<Segment>> {
    if path.is_empty() {
        return Err(UpdateError::invalid("update path must not be empty"));
    }
    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            return Err(UpdateError::invalid(format!("malformed path '{}'", path)));
        }
        segments.push(Segment::new(part));
    }
    Ok(segments)
}

/// Resolve a path for reading. Any missing or mistyped step yields `None`.
pub(crate) fn get_path<'a>(doc: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    let mut current = doc;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(&segment.name)?,
            Value::Array(items) => items.get(segment.index?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Mutable twin of [`get_path`]; never creates anything.
pub(crate) fn get_path_mut<'a>(doc: &'a mut Value, segments: &[Segment]) -> Option<&'a mut Value> {
    let mut current = doc;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get_mut(&segment.name)?,
            Value::Array(items) => items.get_mut(segment.index?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve a path for writing, creating missing intermediates and the leaf
/// slot itself (as `Null`) when absent.
///
/// Traversing into a scalar fails: a path cannot descend through a value
/// that is neither object, array, nor absent.
pub(crate) fn slot_mut<'a>(
    doc: &'a mut Value,
    segments: &[Segment],
    path: &str,
) -> UpdateResult<&'a mut Value> {
    let mut current = doc;
    for segment in segments {
        if current.is_null() {
            *current = if segment.index.is_some() {
                Value::Array(Vec::new())
            } else {
                Value::Object(Map::new())
            };
        }
        current = match current {
            Value::Object(map) => map.entry(segment.name.clone()).or_insert(Value::Null),
            Value::Array(items) => {
                let index = segment.index.ok_or_else(|| {
                    UpdateError::invalid(format!(
                        "cannot index array with '{}' in path '{}'",
                        segment.name, path
                    ))
                })?;
                if items.len() <= index {
                    items.resize(index + 1, Value::Null);
                }
                &mut items[index]
            }
            _ => {
                return Err(UpdateError::invalid(format!(
                    "cannot create field '{}' through a scalar in path '{}'",
                    segment.name, path
                )));
            }
        };
    }
    Ok(current)
}

/// Remove the leaf at `segments`. Object leaves are deleted; array slots are
/// set to `Null`, preserving array length. Missing paths are a no-op.
pub(crate) fn unset_path(doc: &mut Value, segments: &[Segment]) {
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };
    let mut current = doc;
    for segment in parents {
        current = match current {
            Value::Object(map) => match map.get_mut(&segment.name) {
                Some(next) => next,
                None => return,
            },
            Value::Array(items) => {
                let Some(index) = segment.index else { return };
                match items.get_mut(index) {
                    Some(next) => next,
                    None => return,
                }
            }
            _ => return,
        };
    }
    match current {
        Value::Object(map) => {
            map.remove(&leaf.name);
        }
        Value::Array(items) => {
            if let Some(index) = leaf.index {
                if let Some(slot) = items.get_mut(index) {
                    *slot = Value::Null;
                }
            }
        }
        _ => {}
    }
}
