//! Path addressing over nested JSON values.
//!
//! A path is a dot-separated list of segments; each segment is a field name
//! optionally followed by one bracketed non-negative index, e.g.
//! `choices[0].message.content`. A segment made only of an index (`[2]`)
//! addresses the current value as a list.

use std::fmt;

use serde_json::{Map, Value};

use crate::types::errors::PathError;

/// Largest list index a path may address. Writes pad lists up to this length.
pub const MAX_INDEX: usize = 1024;

/// A single navigation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathAddress {
    raw: String,
    segments: Vec<Segment>,
}

impl PathAddress {
    /// Parses a path expression.
    ///
    /// # Errors
    /// Returns `PathError::Invalid` for empty paths, empty segments, unclosed
    /// or non-numeric brackets, indices above [`MAX_INDEX`], and anything
    /// trailing a closing bracket.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let invalid = |reason: &str| PathError::Invalid {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if path.is_empty() {
            return Err(invalid("path is empty"));
        }

        let mut segments = Vec::new();
        for part in path.split('.') {
            if part.is_empty() {
                return Err(invalid("empty segment"));
            }

            let (key, index) = match part.find('[') {
                None => {
                    if part.contains(']') {
                        return Err(invalid("unexpected ']'"));
                    }
                    (part, None)
                }
                Some(open) => {
                    let rest = &part[open + 1..];
                    let close = rest.find(']').ok_or_else(|| invalid("unclosed '['"))?;
                    if close + 1 != rest.len() {
                        return Err(invalid("only one index is allowed per segment"));
                    }
                    let digits = &rest[..close];
                    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(invalid("index must be a non-negative integer"));
                    }
                    let index: usize = digits
                        .parse()
                        .ok()
                        .filter(|i| *i <= MAX_INDEX)
                        .ok_or_else(|| invalid("index out of range"))?;
                    (&part[..open], Some(index))
                }
            };

            if key.contains(']') {
                return Err(invalid("unexpected ']'"));
            }
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            if let Some(i) = index {
                segments.push(Segment::Index(i));
            }
        }

        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Reads the value at this path. Returns `None` when any key or index is
    /// missing or a container has the wrong shape. A present `null` is
    /// returned as `Some(&Value::Null)`.
    pub fn get<'v>(&self, root: &'v Value) -> Option<&'v Value> {
        self.segments.iter().try_fold(root, |current, segment| match segment {
            Segment::Key(key) => current.as_object()?.get(key),
            Segment::Index(i) => current.as_array()?.get(*i),
        })
    }

    /// Writes `value` at this path, creating intermediate objects and list
    /// slots as needed. Lists grow to the required length with `{}` padding.
    /// An intermediate value of the wrong shape is replaced.
    pub fn set(&self, root: &mut Value, value: Value) {
        let mut current = root;
        for segment in &self.segments {
            current = match segment {
                Segment::Key(key) => ensure_object(current)
                    .entry(key.clone())
                    .or_insert(Value::Null),
                Segment::Index(i) => {
                    let list = ensure_array(current);
                    while list.len() <= *i {
                        list.push(Value::Object(Map::new()));
                    }
                    &mut list[*i]
                }
            };
        }
        *current = value;
    }
}

impl fmt::Display for PathAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            *other = Value::Object(Map::new());
            ensure_object(other)
        }
    }
}

fn ensure_array(value: &mut Value) -> &mut Vec<Value> {
    match value {
        Value::Array(list) => list,
        other => {
            *other = Value::Array(Vec::new());
            ensure_array(other)
        }
    }
}

/// Reads `path` from `root`. An unparseable path reads as absent.
pub fn get_path<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    PathAddress::parse(path).ok()?.get(root)
}

/// Writes `value` at `path` inside `root`.
///
/// # Errors
/// Returns `PathError::Invalid` if `path` does not parse; `root` is untouched.
pub fn set_path(root: &mut Value, path: &str, value: Value) -> Result<(), PathError> {
    PathAddress::parse(path)?.set(root, value);
    Ok(())
}
