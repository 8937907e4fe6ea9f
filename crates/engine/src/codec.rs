//! Fragment codec: JSON documents to path-addressed leaf fragments and back
//!
//! A document is walked depth first. Every scalar becomes one leaf keyed by
//! its full leaf path (`$.history.previousAddresses[1]`), so object and array
//! structure is recovered from the set of paths alone.
//!
//! # Leaf rules
//!
//! - Strings are split into chunks of at most `capacity` bytes. Chunks may end
//!   inside a multi-byte UTF-8 sequence; decoding happens after reassembly.
//! - Numbers (serde_json text form) and booleans are never split. One that
//!   does not fit in a single fragment is a [`Error::Fragmentation`].
//! - `null` object members are omitted. A nested object left with no leaves
//!   is stored as `{}` so that it keeps its place.
//! - `null` array elements, `{}` and `[]` are stored as zero-length marker
//!   leaves so that the round trip is exact.
//! - An array directly inside an array has no path form and is rejected.
//! - The document root must be an object.
//! - Member names may not contain NUL; leaf paths are NUL-terminated on disk.

use std::collections::BTreeMap;

use serde_json::Map;

use chronodoc_core::{DocumentKey, Error, JsonPath, JsonValue, PathSegment, Result};

/// Smallest fragment capacity the codec accepts
pub const MIN_FRAGMENT_CAPACITY: usize = 16;

/// Default fragment capacity in bytes
pub const DEFAULT_FRAGMENT_CAPACITY: usize = 8192;

/// Kind of value a leaf holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    /// UTF-8 string, possibly chunked
    String = 1,
    /// Number in JSON text form
    Number = 2,
    /// `true` or `false`
    Boolean = 3,
    /// `null` array element
    Null = 4,
    /// `{}`
    EmptyObject = 5,
    /// `[]`
    EmptyArray = 6,
}

impl ValueType {
    /// Stored tag byte
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Parse a stored tag byte
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ValueType::String),
            2 => Some(ValueType::Number),
            3 => Some(ValueType::Boolean),
            4 => Some(ValueType::Null),
            5 => Some(ValueType::EmptyObject),
            6 => Some(ValueType::EmptyArray),
            _ => None,
        }
    }
}

/// One physically stored chunk of a leaf value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafFragment {
    /// Kind of the whole leaf value
    pub value_type: ValueType,
    /// Position of this chunk, `0..count`
    pub index: u32,
    /// Number of chunks the leaf value was split into
    pub count: u32,
    /// Raw chunk bytes
    pub bytes: Vec<u8>,
}

/// A document version in storage form
///
/// Leaves are keyed by leaf path text; each holds its fragments in index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedDocument {
    key: DocumentKey,
    leaves: BTreeMap<String, Vec<LeafFragment>>,
    deleted: bool,
}

impl FlattenedDocument {
    /// A live version with the given leaves
    pub fn new(key: DocumentKey, leaves: BTreeMap<String, Vec<LeafFragment>>) -> Self {
        FlattenedDocument {
            key,
            leaves,
            deleted: false,
        }
    }

    /// A tombstone version
    pub fn tombstone(key: DocumentKey) -> Self {
        FlattenedDocument {
            key,
            leaves: BTreeMap::new(),
            deleted: true,
        }
    }

    /// Version identity
    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    /// Leaves by path
    pub fn leaves(&self) -> &BTreeMap<String, Vec<LeafFragment>> {
        &self.leaves
    }

    /// True for tombstones
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Total number of stored fragments
    pub fn fragment_count(&self) -> usize {
        self.leaves.values().map(Vec::len).sum()
    }

    /// Reassembled value of the leaf at exactly `path`
    pub fn leaf(&self, path: &str) -> Result<Option<JsonValue>> {
        self.leaves
            .get(path)
            .map(|fragments| reassemble(path, fragments))
            .transpose()
    }
}

/// Flattens and reassembles documents under one fragment capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentCodec {
    capacity: usize,
}

impl FragmentCodec {
    /// Create a codec; `capacity` must be at least [`MIN_FRAGMENT_CAPACITY`]
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < MIN_FRAGMENT_CAPACITY {
            return Err(Error::Config(format!(
                "fragment capacity {} is below the minimum of {}",
                capacity, MIN_FRAGMENT_CAPACITY
            )));
        }
        Ok(FragmentCodec { capacity })
    }

    /// Maximum chunk size in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Split `json` into leaf fragments
    pub fn flatten(&self, key: DocumentKey, json: &JsonValue) -> Result<FlattenedDocument> {
        if !json.is_object() {
            return Err(Error::fragmentation("$", "document root must be an object"));
        }
        let mut leaves = BTreeMap::new();
        let mut path = JsonPath::root();
        self.walk(&mut path, json, false, &mut leaves)?;
        Ok(FlattenedDocument::new(key, leaves))
    }

    fn walk(
        &self,
        path: &mut JsonPath,
        value: &JsonValue,
        in_array: bool,
        out: &mut BTreeMap<String, Vec<LeafFragment>>,
    ) -> Result<()> {
        match value {
            JsonValue::Null => {
                if in_array {
                    out.insert(path.to_string(), marker(ValueType::Null));
                }
            }
            JsonValue::Bool(b) => {
                let text = if *b { "true" } else { "false" };
                out.insert(path.to_string(), self.unsplit(path, ValueType::Boolean, text)?);
            }
            JsonValue::Number(n) => {
                let text = n.to_string();
                out.insert(path.to_string(), self.unsplit(path, ValueType::Number, &text)?);
            }
            JsonValue::String(s) => {
                out.insert(path.to_string(), self.chunked(path, s.as_bytes())?);
            }
            JsonValue::Object(map) => {
                if map.is_empty() {
                    if !path.is_empty() {
                        out.insert(path.to_string(), marker(ValueType::EmptyObject));
                    }
                    return Ok(());
                }
                let before = out.len();
                for (name, child) in map {
                    if name.contains('\0') {
                        return Err(Error::fragmentation(
                            path.to_string(),
                            "member names may not contain NUL",
                        ));
                    }
                    path.push(PathSegment::Key(name.clone()));
                    let result = self.walk(path, child, false, out);
                    path.pop();
                    result?;
                }
                // every member was null
                if out.len() == before && !path.is_empty() {
                    out.insert(path.to_string(), marker(ValueType::EmptyObject));
                }
            }
            JsonValue::Array(items) => {
                if in_array {
                    return Err(Error::fragmentation(
                        path.to_string(),
                        "arrays directly nested in arrays are not supported",
                    ));
                }
                if items.is_empty() {
                    out.insert(path.to_string(), marker(ValueType::EmptyArray));
                    return Ok(());
                }
                for (i, child) in items.iter().enumerate() {
                    path.push(PathSegment::Index(i));
                    let result = self.walk(path, child, true, out);
                    path.pop();
                    result?;
                }
            }
        }
        Ok(())
    }

    fn unsplit(
        &self,
        path: &JsonPath,
        value_type: ValueType,
        text: &str,
    ) -> Result<Vec<LeafFragment>> {
        if text.len() > self.capacity {
            return Err(Error::fragmentation(
                path.to_string(),
                format!(
                    "{:?} value of {} bytes exceeds fragment capacity {}",
                    value_type,
                    text.len(),
                    self.capacity
                ),
            ));
        }
        Ok(vec![LeafFragment {
            value_type,
            index: 0,
            count: 1,
            bytes: text.as_bytes().to_vec(),
        }])
    }

    fn chunked(&self, path: &JsonPath, bytes: &[u8]) -> Result<Vec<LeafFragment>> {
        if bytes.is_empty() {
            return Ok(vec![LeafFragment {
                value_type: ValueType::String,
                index: 0,
                count: 1,
                bytes: Vec::new(),
            }]);
        }
        let count = u32::try_from(bytes.len().div_ceil(self.capacity)).map_err(|_| {
            Error::fragmentation(path.to_string(), "string needs more than u32::MAX fragments")
        })?;
        Ok(bytes
            .chunks(self.capacity)
            .zip(0u32..)
            .map(|(chunk, index)| LeafFragment {
                value_type: ValueType::String,
                index,
                count,
                bytes: chunk.to_vec(),
            })
            .collect())
    }

    /// Reassemble a document; `None` for tombstones
    pub fn unflatten(&self, doc: &FlattenedDocument) -> Result<Option<JsonValue>> {
        if doc.is_deleted() {
            return Ok(None);
        }
        let mut root = JsonValue::Object(Map::new());
        for (path_text, fragments) in doc.leaves() {
            let path: JsonPath = path_text.parse().map_err(|e| {
                Error::Corruption(format!("stored leaf path '{}' is invalid: {}", path_text, e))
            })?;
            let value = reassemble(path_text, fragments)?;
            insert_at(&mut root, path.segments(), value, path_text)?;
        }
        Ok(Some(root))
    }
}

impl Default for FragmentCodec {
    fn default() -> Self {
        FragmentCodec {
            capacity: DEFAULT_FRAGMENT_CAPACITY,
        }
    }
}

fn marker(value_type: ValueType) -> Vec<LeafFragment> {
    vec![LeafFragment {
        value_type,
        index: 0,
        count: 1,
        bytes: Vec::new(),
    }]
}

/// Concatenate one leaf's fragments and decode the value
pub fn reassemble(path: &str, fragments: &[LeafFragment]) -> Result<JsonValue> {
    let first = fragments
        .first()
        .ok_or_else(|| Error::Corruption(format!("leaf '{}' has no fragments", path)))?;
    let complete = fragments.len() == first.count as usize
        && fragments.iter().zip(0u32..).all(|(f, i)| {
            f.index == i && f.count == first.count && f.value_type == first.value_type
        });
    if !complete {
        return Err(Error::Corruption(format!(
            "leaf '{}' has an incomplete fragment set",
            path
        )));
    }

    let bytes: Vec<u8> = fragments
        .iter()
        .flat_map(|f| f.bytes.iter().copied())
        .collect();
    let corrupt =
        |what: &str| Error::Corruption(format!("leaf '{}' holds an invalid {}", path, what));

    match first.value_type {
        ValueType::String => String::from_utf8(bytes)
            .map(JsonValue::String)
            .map_err(|_| corrupt("string")),
        ValueType::Number => serde_json::from_slice::<serde_json::Number>(&bytes)
            .map(JsonValue::Number)
            .map_err(|_| corrupt("number")),
        ValueType::Boolean => match bytes.as_slice() {
            b"true" => Ok(JsonValue::Bool(true)),
            b"false" => Ok(JsonValue::Bool(false)),
            _ => Err(corrupt("boolean")),
        },
        ValueType::Null => Ok(JsonValue::Null),
        ValueType::EmptyObject => Ok(JsonValue::Object(Map::new())),
        ValueType::EmptyArray => Ok(JsonValue::Array(Vec::new())),
    }
}

fn insert_at(
    node: &mut JsonValue,
    segments: &[PathSegment],
    leaf: JsonValue,
    path: &str,
) -> Result<()> {
    let Some((head, rest)) = segments.split_first() else {
        *node = leaf;
        return Ok(());
    };
    let shape_error =
        || Error::Corruption(format!("leaf '{}' conflicts with a sibling leaf", path));
    match head {
        PathSegment::Key(name) => {
            if node.is_null() {
                *node = JsonValue::Object(Map::new());
            }
            let map = node.as_object_mut().ok_or_else(shape_error)?;
            let child = map.entry(name.clone()).or_insert(JsonValue::Null);
            insert_at(child, rest, leaf, path)
        }
        PathSegment::Index(i) => {
            if node.is_null() {
                *node = JsonValue::Array(Vec::new());
            }
            let items = node.as_array_mut().ok_or_else(shape_error)?;
            if items.len() <= *i {
                items.resize(*i + 1, JsonValue::Null);
            }
            insert_at(&mut items[*i], rest, leaf, path)
        }
        PathSegment::AnyIndex => Err(Error::Corruption(format!(
            "stored leaf path '{}' contains a wildcard",
            path
        ))),
    }
}
