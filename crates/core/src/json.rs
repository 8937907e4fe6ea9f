//! JSON values and navigation paths
//!
//! Documents are plain [`serde_json::Value`] trees ([`JsonValue`]), a closed
//! tagged variant of `Null | Bool | Number | String | Array | Object`.
//!
//! A [`JsonPath`] addresses a location inside a document. Two flavors exist:
//!
//! - **Leaf paths** contain concrete array indices: `$.name[1].first`.
//!   Every stored fragment is keyed by one.
//! - **Schema paths** use `[]` for "any element": `$.history.previousAddresses[]`.
//!   Link indexes and the specification are keyed by these.
//!
//! # Path Syntax
//!
//! | Syntax | Meaning | Example |
//! |--------|---------|---------|
//! | `$` | Root | `$` |
//! | `.key` | Object property | `$.city` |
//! | `["key"]` | Property with arbitrary characters | `$["a.b"]` |
//! | `[n]` | Array index | `$.name[0]` |
//! | `[]` | Any array element | `$.links[]` |
//!
//! The leading `$` is optional when parsing: `lastname`, `.lastname` and
//! `$.lastname` are the same path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// JSON document value
pub type JsonValue = serde_json::Value;

// =============================================================================
// JsonPath and PathSegment
// =============================================================================

/// Error type for JSON path parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathParseError {
    /// Empty key in path
    #[error("empty key in path at position {0}")]
    EmptyKey(usize),
    /// Unclosed bracket
    #[error("unclosed bracket starting at position {0}")]
    UnclosedBracket(usize),
    /// Unterminated quoted key
    #[error("unterminated quoted key starting at position {0}")]
    UnterminatedQuote(usize),
    /// Invalid array index
    #[error("invalid array index at position {0}: {1}")]
    InvalidIndex(usize, String),
    /// Unexpected character
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
}

/// A segment in a JSON path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PathSegment {
    /// Object key: `.foo`
    Key(String),
    /// Array index: `[0]`
    Index(usize),
    /// Any array element: `[]`
    AnyIndex,
}

fn is_plain_key_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(is_plain_key_char)
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) if is_plain_key(k) => write!(f, ".{}", k),
            PathSegment::Key(k) => {
                f.write_str("[\"")?;
                for c in k.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str("\"]")
            }
            PathSegment::Index(i) => write!(f, "[{}]", i),
            PathSegment::AnyIndex => f.write_str("[]"),
        }
    }
}

/// A path into a JSON document
///
/// # Examples
///
/// ```
/// use chronodoc_core::json::JsonPath;
///
/// let leaf = JsonPath::root().key("history").key("previousAddresses").index(1);
/// assert_eq!(leaf.to_string(), "$.history.previousAddresses[1]");
///
/// let schema: JsonPath = "$.history.previousAddresses[]".parse().unwrap();
/// assert_eq!(leaf.schema_path(), schema);
/// assert!(schema.matches(&leaf));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct JsonPath {
    segments: Vec<PathSegment>,
}

impl JsonPath {
    /// Create the root path (empty path)
    pub fn root() -> Self {
        JsonPath {
            segments: Vec::new(),
        }
    }

    /// Create a path from a vector of segments
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        JsonPath { segments }
    }

    /// Get the path segments
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Get the number of segments in the path
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Check if this is the root path
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a key segment (builder pattern)
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    /// Append an index segment (builder pattern)
    pub fn index(mut self, idx: usize) -> Self {
        self.segments.push(PathSegment::Index(idx));
        self
    }

    /// Append an any-element segment (builder pattern)
    pub fn any_index(mut self) -> Self {
        self.segments.push(PathSegment::AnyIndex);
        self
    }

    /// Push a segment (mutating)
    pub fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    /// Remove the last segment (mutating)
    pub fn pop(&mut self) -> Option<PathSegment> {
        self.segments.pop()
    }

    /// True if any segment is `[]`
    pub fn has_wildcard(&self) -> bool {
        self.segments.contains(&PathSegment::AnyIndex)
    }

    /// The schema path of this path: every concrete index becomes `[]`
    pub fn schema_path(&self) -> JsonPath {
        JsonPath {
            segments: self
                .segments
                .iter()
                .map(|s| match s {
                    PathSegment::Index(_) => PathSegment::AnyIndex,
                    other => other.clone(),
                })
                .collect(),
        }
    }

    /// Check whether a concrete leaf path is covered by this (possibly wildcard) path
    pub fn matches(&self, leaf: &JsonPath) -> bool {
        self.segments.len() == leaf.segments.len()
            && self
                .segments
                .iter()
                .zip(leaf.segments.iter())
                .all(|(pattern, concrete)| match (pattern, concrete) {
                    (PathSegment::AnyIndex, PathSegment::Index(_)) => true,
                    (PathSegment::AnyIndex, PathSegment::AnyIndex) => true,
                    (a, b) => a == b,
                })
    }

    /// Collect every value in `json` addressed by this path
    ///
    /// `[]` expands to all elements of an array. Missing members yield nothing.
    pub fn select<'v>(&self, json: &'v JsonValue) -> Vec<&'v JsonValue> {
        let mut out = Vec::new();
        select_into(&self.segments, json, &mut out);
        out
    }
}

fn select_into<'v>(segments: &[PathSegment], json: &'v JsonValue, out: &mut Vec<&'v JsonValue>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(json);
        return;
    };
    match (head, json) {
        (PathSegment::Key(k), JsonValue::Object(map)) => {
            if let Some(child) = map.get(k) {
                select_into(rest, child, out);
            }
        }
        (PathSegment::Index(i), JsonValue::Array(items)) => {
            if let Some(child) = items.get(*i) {
                select_into(rest, child, out);
            }
        }
        (PathSegment::AnyIndex, JsonValue::Array(items)) => {
            for child in items {
                select_into(rest, child, out);
            }
        }
        _ => {}
    }
}

impl FromStr for JsonPath {
    type Err = PathParseError;

    /// Parse a path from a string
    ///
    /// Supported syntax:
    /// - `$`, `$.foo`, `.foo` or `foo` - object key
    /// - `["a.b"]` - quoted object key (`\"` and `\\` escapes)
    /// - `[0]` - array index
    /// - `[]` - any array element
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;

        if i < chars.len() && chars[i] == '$' {
            i += 1;
        }
        let body_start = i;

        while i < chars.len() {
            let c = chars[i];

            if c == '.' || (i == body_start && is_plain_key_char(c)) {
                if c == '.' {
                    i += 1;
                }
                let key_start = i;
                while i < chars.len() && is_plain_key_char(chars[i]) {
                    i += 1;
                }
                if i == key_start {
                    return Err(PathParseError::EmptyKey(key_start));
                }
                segments.push(PathSegment::Key(chars[key_start..i].iter().collect()));
            } else if c == '[' {
                let start = i;
                i += 1;
                if i >= chars.len() {
                    return Err(PathParseError::UnclosedBracket(start));
                }
                if chars[i] == ']' {
                    segments.push(PathSegment::AnyIndex);
                    i += 1;
                } else if chars[i] == '"' {
                    let quote_start = i;
                    i += 1;
                    let mut key = String::new();
                    loop {
                        match chars.get(i) {
                            None => return Err(PathParseError::UnterminatedQuote(quote_start)),
                            Some('\\') => {
                                let escaped = chars
                                    .get(i + 1)
                                    .ok_or(PathParseError::UnterminatedQuote(quote_start))?;
                                key.push(*escaped);
                                i += 2;
                            }
                            Some('"') => {
                                i += 1;
                                break;
                            }
                            Some(other) => {
                                key.push(*other);
                                i += 1;
                            }
                        }
                    }
                    if chars.get(i) != Some(&']') {
                        return Err(PathParseError::UnclosedBracket(start));
                    }
                    i += 1;
                    segments.push(PathSegment::Key(key));
                } else {
                    let idx_start = i;
                    while i < chars.len() && chars[i] != ']' {
                        i += 1;
                    }
                    if i >= chars.len() {
                        return Err(PathParseError::UnclosedBracket(start));
                    }
                    let idx_str: String = chars[idx_start..i].iter().collect();
                    let idx = idx_str
                        .parse::<usize>()
                        .map_err(|_| PathParseError::InvalidIndex(idx_start, idx_str))?;
                    segments.push(PathSegment::Index(idx));
                    i += 1;
                }
            } else {
                return Err(PathParseError::UnexpectedChar(c, i));
            }
        }

        Ok(JsonPath { segments })
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for seg in &self.segments {
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}
