//! Reference-path extraction over JSON documents.
//!
//! Supports the reference-path subset of JSONPath used by state fields:
//! `$`, dotted members (`$.a.b`), bracketed members (`$['a b']`) and array
//! indices (`$.items[0]`). Wildcards, filters and slices are rejected.

use serde_json::Value;
use std::fmt;

use super::error::PathError;

/// One step of a parsed reference path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Object member lookup.
    Field(String),
    /// Array element lookup.
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => write!(f, ".{}", name),
            Segment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// Parse a reference path into its segments.
pub fn parse_path(path: &str) -> Result<Vec<Segment>, PathError> {
    let invalid = |reason: &str| PathError::Invalid {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let rest = path
        .strip_prefix('$')
        .ok_or_else(|| invalid("path must start with '$'"))?;
    if rest.starts_with('$') {
        return Err(invalid("context object paths are not supported"));
    }

    let chars: Vec<char> = rest.chars().collect();
    let mut segments = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        match chars[pos] {
            '.' => {
                pos += 1;
                let start = pos;
                while pos < chars.len() && chars[pos] != '.' && chars[pos] != '[' {
                    pos += 1;
                }
                let name: String = chars[start..pos].iter().collect();
                if name.is_empty() {
                    return Err(invalid("empty member name"));
                }
                if name == "*" {
                    return Err(invalid("wildcards are not supported"));
                }
                if let Some(bad) = name
                    .chars()
                    .find(|&c| c.is_whitespace() || matches!(c, ']' | '\'' | '"'))
                {
                    return Err(invalid(&format!(
                        "unexpected character '{}' in member name",
                        bad
                    )));
                }
                segments.push(Segment::Field(name));
            }
            '[' => {
                pos += 1;
                let close = chars[pos..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|offset| pos + offset)
                    .ok_or_else(|| invalid("unterminated '['"))?;
                let inner: String = chars[pos..close].iter().collect();
                segments.push(parse_bracket(&inner).ok_or_else(|| {
                    invalid(&format!("unsupported bracket expression '[{}]'", inner))
                })?);
                pos = close + 1;
            }
            other => {
                return Err(invalid(&format!("unexpected character '{}'", other)));
            }
        }
    }

    Ok(segments)
}

fn parse_bracket(inner: &str) -> Option<Segment> {
    let trimmed = inner.trim();
    for quote in ['\'', '"'] {
        if let Some(name) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return Some(Segment::Field(name.to_string()));
        }
    }
    trimmed.parse::<usize>().ok().map(Segment::Index)
}

/// Extract the value selected by `path` from `document`.
///
/// The returned value is a copy; `document` is never modified.
pub fn extract_json(path: &str, document: &Value) -> Result<Value, PathError> {
    let segments = parse_path(path)?;
    let mut current = document;
    for segment in &segments {
        let next = match (segment, current) {
            (Segment::Field(name), Value::Object(map)) => map.get(name),
            (Segment::Index(index), Value::Array(items)) => items.get(*index),
            _ => None,
        };
        current = next.ok_or_else(|| PathError::NotFound {
            path: path.to_string(),
            segment: segment.to_string(),
        })?;
    }
    Ok(current.clone())
}
