//! Byte layout of every key the store writes
//!
//! All state lives in four subspaces of one ordered KV keyspace:
//!
//! | Subspace | Key | Value |
//! |----------|-----|-------|
//! | content  | `ns entity id ts path frag` | `[type][count u32][chunk]` |
//! | version  | `ns entity id ts` | `[flag]` (0 live, 1 tombstone) |
//! | forward  | `ns srcEntity srcId ts path tgtEntity tgtId` | empty |
//! | backward | `ns tgtEntity tgtId path srcEntity srcId ts` | empty |
//!
//! String components are NUL-terminated (identifiers may not contain NUL),
//! timestamps use [`Timestamp::to_sortable_bytes`], fragment indices are
//! big-endian `u32`. Byte order therefore equals `(string, time, index)` order
//! component by component.

use std::ops::Bound;

use byteorder::{BigEndian, ByteOrder};

use chronodoc_core::{Error, Result, Timestamp};

/// Leading byte of each subspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Subspace {
    /// Leaf fragments
    Content = 0x01,
    /// Version records
    Version = 0x02,
    /// Source-to-target link entries
    Forward = 0x03,
    /// Target-to-source link entries
    Backward = 0x04,
}

/// Flag byte of a live version record
pub const VERSION_LIVE: u8 = 0;
/// Flag byte of a tombstone version record
pub const VERSION_TOMBSTONE: u8 = 1;

const TERMINATOR: u8 = 0x00;

// =============================================================================
// Building keys
// =============================================================================

/// Incremental key writer
#[derive(Debug, Clone)]
pub struct KeyBuilder(Vec<u8>);

impl KeyBuilder {
    /// Start a key in `subspace`
    pub fn new(subspace: Subspace) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.push(subspace as u8);
        KeyBuilder(buf)
    }

    /// Append a NUL-terminated string component
    pub fn str(mut self, s: &str) -> Self {
        self.0.extend_from_slice(s.as_bytes());
        self.0.push(TERMINATOR);
        self
    }

    /// Append a timestamp component
    pub fn ts(mut self, ts: Timestamp) -> Self {
        self.0.extend_from_slice(&ts.to_sortable_bytes());
        self
    }

    /// Append a big-endian `u32` component
    pub fn u32(mut self, n: u32) -> Self {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, n);
        self.0.extend_from_slice(&buf);
        self
    }

    /// Finish the key
    pub fn build(self) -> Vec<u8> {
        self.0
    }
}

/// Cursor over the components of a stored key
#[derive(Debug)]
pub struct KeyReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> KeyReader<'a> {
    /// Read the components that follow `prefix_len` bytes of `key`
    pub fn after(key: &'a [u8], prefix_len: usize) -> Result<Self> {
        if key.len() < prefix_len {
            return Err(Error::Corruption(format!(
                "key of {} bytes shorter than its {}-byte prefix",
                key.len(),
                prefix_len
            )));
        }
        Ok(KeyReader {
            buf: key,
            pos: prefix_len,
        })
    }

    /// Read a NUL-terminated string component
    pub fn str(&mut self) -> Result<String> {
        let rest = &self.buf[self.pos..];
        let end = rest
            .iter()
            .position(|b| *b == TERMINATOR)
            .ok_or_else(|| Error::Corruption("unterminated key component".to_string()))?;
        let s = std::str::from_utf8(&rest[..end])
            .map_err(|e| Error::Corruption(format!("key component is not UTF-8: {}", e)))?;
        self.pos += end + 1;
        Ok(s.to_string())
    }

    /// Read a timestamp component
    pub fn ts(&mut self) -> Result<Timestamp> {
        let bytes = self.take(Timestamp::ENCODED_LEN)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(Timestamp::from_sortable_bytes(raw))
    }

    /// Read a big-endian `u32` component
    pub fn u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < self.pos + n {
            return Err(Error::Corruption("truncated key".to_string()));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }
}

// =============================================================================
// Prefixes and ranges
// =============================================================================

/// `subspace ns entity`
pub fn entity_prefix(subspace: Subspace, ns: &str, entity: &str) -> Vec<u8> {
    KeyBuilder::new(subspace).str(ns).str(entity).build()
}

/// `subspace ns entity id`
pub fn identity_prefix(subspace: Subspace, ns: &str, entity: &str, id: &str) -> Vec<u8> {
    KeyBuilder::new(subspace).str(ns).str(entity).str(id).build()
}

/// Version record key
pub fn version_key(ns: &str, entity: &str, id: &str, ts: Timestamp) -> Vec<u8> {
    KeyBuilder::new(Subspace::Version)
        .str(ns)
        .str(entity)
        .str(id)
        .ts(ts)
        .build()
}

/// All fragments of one version
pub fn content_version_prefix(ns: &str, entity: &str, id: &str, ts: Timestamp) -> Vec<u8> {
    KeyBuilder::new(Subspace::Content)
        .str(ns)
        .str(entity)
        .str(id)
        .ts(ts)
        .build()
}

/// All fragments of one leaf path within one version
pub fn content_leaf_prefix(ns: &str, entity: &str, id: &str, ts: Timestamp, path: &str) -> Vec<u8> {
    KeyBuilder::new(Subspace::Content)
        .str(ns)
        .str(entity)
        .str(id)
        .ts(ts)
        .str(path)
        .build()
}

/// Key of one stored fragment
pub fn content_key(
    ns: &str,
    entity: &str,
    id: &str,
    ts: Timestamp,
    path: &str,
    index: u32,
) -> Vec<u8> {
    KeyBuilder::new(Subspace::Content)
        .str(ns)
        .str(entity)
        .str(id)
        .ts(ts)
        .str(path)
        .u32(index)
        .build()
}

/// Forward entries of one source version
pub fn forward_version_prefix(ns: &str, entity: &str, id: &str, ts: Timestamp) -> Vec<u8> {
    KeyBuilder::new(Subspace::Forward)
        .str(ns)
        .str(entity)
        .str(id)
        .ts(ts)
        .build()
}

/// Forward entries of one source version, one path, one target entity
pub fn forward_target_prefix(
    ns: &str,
    entity: &str,
    id: &str,
    ts: Timestamp,
    path: &str,
    target_entity: &str,
) -> Vec<u8> {
    KeyBuilder::new(Subspace::Forward)
        .str(ns)
        .str(entity)
        .str(id)
        .ts(ts)
        .str(path)
        .str(target_entity)
        .build()
}

/// Backward entries of one target, one path, one source entity
pub fn backward_source_prefix(
    ns: &str,
    target_entity: &str,
    target_id: &str,
    path: &str,
    source_entity: &str,
) -> Vec<u8> {
    KeyBuilder::new(Subspace::Backward)
        .str(ns)
        .str(target_entity)
        .str(target_id)
        .str(path)
        .str(source_entity)
        .build()
}

/// Smallest key greater than every key starting with `prefix`
///
/// Trailing `0xFF` bytes are dropped before the increment. A prefix made only
/// of `0xFF` bytes has no successor; an empty vector is returned.
pub fn strinc(prefix: &[u8]) -> Vec<u8> {
    let mut out = prefix.to_vec();
    while let Some(last) = out.pop() {
        if last != 0xFF {
            out.push(last + 1);
            return out;
        }
    }
    out
}

/// Half-open `[prefix, strinc(prefix))` covering every key under `prefix`
pub fn prefix_range(prefix: &[u8]) -> (Vec<u8>, Vec<u8>) {
    (prefix.to_vec(), strinc(prefix))
}

/// Byte bounds selecting ids within `(lower, upper)` directly under `prefix`
///
/// Keys under the prefix look like `prefix id \0 rest`. Since ids contain no
/// NUL, `prefix id \0` sorts before any other key of the same id and
/// `prefix id \x01` sorts after all of them and before any longer id.
pub fn id_bounds(
    prefix: &[u8],
    lower: Bound<&str>,
    upper: Bound<&str>,
) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    let with = |id: &str, tail: u8| {
        let mut key = prefix.to_vec();
        key.extend_from_slice(id.as_bytes());
        key.push(tail);
        key
    };
    let lo = match lower {
        Bound::Unbounded => Bound::Included(prefix.to_vec()),
        Bound::Included(id) => Bound::Included(with(id, 0x00)),
        Bound::Excluded(id) => Bound::Included(with(id, 0x01)),
    };
    let hi = match upper {
        Bound::Unbounded => Bound::Excluded(strinc(prefix)),
        Bound::Included(id) => Bound::Excluded(with(id, 0x01)),
        Bound::Excluded(id) => Bound::Excluded(with(id, 0x00)),
    };
    (lo, hi)
}

/// Byte bounds selecting timestamps within `(lower, upper)` directly under `prefix`
///
/// Only exact for keys that end right after the timestamp (version records).
pub fn time_bounds(
    prefix: &[u8],
    lower: Bound<&Timestamp>,
    upper: Bound<&Timestamp>,
) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    let with = |ts: &Timestamp| {
        let mut key = prefix.to_vec();
        key.extend_from_slice(&ts.to_sortable_bytes());
        key
    };
    let lo = match lower {
        Bound::Unbounded => Bound::Included(prefix.to_vec()),
        Bound::Included(ts) => Bound::Included(with(ts)),
        Bound::Excluded(ts) => Bound::Excluded(with(ts)),
    };
    let hi = match upper {
        Bound::Unbounded => Bound::Excluded(strinc(prefix)),
        Bound::Included(ts) => Bound::Included(with(ts)),
        Bound::Excluded(ts) => Bound::Excluded(with(ts)),
    };
    (lo, hi)
}

// =============================================================================
// Values
// =============================================================================

/// Encode a fragment value: `[type][count u32][chunk]`
pub fn encode_fragment(type_tag: u8, count: u32, chunk: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + chunk.len());
    out.push(type_tag);
    let mut buf = [0u8; 4];
    BigEndian::write_u32(&mut buf, count);
    out.extend_from_slice(&buf);
    out.extend_from_slice(chunk);
    out
}

/// Decode a fragment value into `(type, count, chunk)`
pub fn decode_fragment(value: &[u8]) -> Result<(u8, u32, &[u8])> {
    if value.len() < 5 {
        return Err(Error::Corruption(format!(
            "fragment value of {} bytes is shorter than its header",
            value.len()
        )));
    }
    Ok((value[0], BigEndian::read_u32(&value[1..5]), &value[5..]))
}

/// Decode a version record flag into "is tombstone"
pub fn decode_version_flag(value: &[u8]) -> Result<bool> {
    match value {
        [VERSION_LIVE] => Ok(false),
        [VERSION_TOMBSTONE] => Ok(true),
        other => Err(Error::Corruption(format!(
            "invalid version record {:?}",
            other
        ))),
    }
}
