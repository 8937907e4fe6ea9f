//! Version store
//!
//! Persists flattened document versions and answers the temporal questions
//! the facade asks: which version is current as of `t`, which versions exist
//! in a time window, which ids of an entity are live at `t`.
//!
//! ## Layout
//!
//! Each version writes one version record (live or tombstone) and, if live,
//! one content entry per fragment. A version is identified by its exact
//! timestamp; writing the same `(ns, entity, id, ts)` again replaces it.

use std::collections::BTreeMap;
use std::ops::Bound;

use chronodoc_core::{Direction, DocumentKey, Error, JsonValue, Result, Timestamp};
use chronodoc_storage::{as_slice_bound, KvTransaction};

use crate::codec::{reassemble, FlattenedDocument, FragmentCodec, LeafFragment, ValueType};
use crate::cursor::{parse_version_record, LiveIdentities, ScanPlan};
use crate::keyspace::{
    content_key, content_leaf_prefix, content_version_prefix, decode_fragment, encode_fragment,
    entity_prefix, identity_prefix, prefix_range, time_bounds, version_key, KeyReader, Subspace,
    VERSION_LIVE, VERSION_TOMBSTONE,
};

/// One row of a document's version history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionEntry {
    /// Version timestamp
    pub timestamp: Timestamp,
    /// True for tombstones
    pub deleted: bool,
}

/// Stream of version entries borrowed from a transaction
pub type VersionStream<'a> = Box<dyn Iterator<Item = Result<VersionEntry>> + 'a>;

/// Stream of document ids borrowed from a transaction
pub type IdStream<'a> = Box<dyn Iterator<Item = Result<String>> + 'a>;

/// Version persistence over an ordered KV transaction
#[derive(Debug, Clone, Copy)]
pub struct VersionStore {
    codec: FragmentCodec,
}

impl VersionStore {
    /// Create a store that flattens with `codec`
    pub fn new(codec: FragmentCodec) -> Self {
        VersionStore { codec }
    }

    /// Codec used for flattening and reassembly
    pub fn codec(&self) -> &FragmentCodec {
        &self.codec
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store one version, replacing any version with the same key
    pub fn write<T: KvTransaction>(&self, tx: &mut T, doc: &FlattenedDocument) -> Result<()> {
        let key = doc.key();
        let (ns, entity, id, ts) = (key.namespace(), key.entity(), key.id(), key.timestamp());

        let (start, end) = prefix_range(&content_version_prefix(ns, entity, id, ts));
        tx.clear_range(&start, &end)?;

        for (path, fragments) in doc.leaves() {
            for fragment in fragments {
                tx.put(
                    &content_key(ns, entity, id, ts, path, fragment.index),
                    &encode_fragment(fragment.value_type.tag(), fragment.count, &fragment.bytes),
                )?;
            }
        }

        let flag = if doc.is_deleted() {
            VERSION_TOMBSTONE
        } else {
            VERSION_LIVE
        };
        tx.put(&version_key(ns, entity, id, ts), &[flag])
    }

    /// Remove one version record and its content
    pub fn remove_version<T: KvTransaction>(&self, tx: &mut T, key: &DocumentKey) -> Result<()> {
        let (ns, entity, id, ts) = (key.namespace(), key.entity(), key.id(), key.timestamp());
        let (start, end) = prefix_range(&content_version_prefix(ns, entity, id, ts));
        tx.clear_range(&start, &end)?;
        tx.delete(&version_key(ns, entity, id, ts))
    }

    /// Remove every version of one document
    pub fn remove_all<T: KvTransaction>(
        &self,
        tx: &mut T,
        ns: &str,
        entity: &str,
        id: &str,
    ) -> Result<()> {
        for subspace in [Subspace::Content, Subspace::Version] {
            let (start, end) = prefix_range(&identity_prefix(subspace, ns, entity, id));
            tx.clear_range(&start, &end)?;
        }
        Ok(())
    }

    /// Remove every version of every document of one entity
    pub fn remove_entity<T: KvTransaction>(
        &self,
        tx: &mut T,
        ns: &str,
        entity: &str,
    ) -> Result<()> {
        for subspace in [Subspace::Content, Subspace::Version] {
            let (start, end) = prefix_range(&entity_prefix(subspace, ns, entity));
            tx.clear_range(&start, &end)?;
        }
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Newest version at or before `as_of`
    pub fn latest<T: KvTransaction>(
        &self,
        tx: &T,
        ns: &str,
        entity: &str,
        id: &str,
        as_of: Timestamp,
    ) -> Result<Option<VersionEntry>> {
        let prefix = identity_prefix(Subspace::Version, ns, entity, id);
        let (lower, upper) = time_bounds(&prefix, Bound::Unbounded, Bound::Included(&as_of));
        let mut scan = tx.scan(
            as_slice_bound(&lower),
            as_slice_bound(&upper),
            Direction::Reverse,
        )?;
        match scan.next() {
            None => Ok(None),
            Some(pair) => {
                let (key, value) = pair?;
                let entity_len = entity_prefix(Subspace::Version, ns, entity).len();
                let (_, timestamp, deleted) = parse_version_record(&key, &value, entity_len)?;
                Ok(Some(VersionEntry { timestamp, deleted }))
            }
        }
    }

    /// Version history of one document within a time plan, in plan order
    pub fn versions<'a, T: KvTransaction>(
        &self,
        tx: &'a T,
        ns: &str,
        entity: &str,
        id: &str,
        plan: &ScanPlan<Timestamp>,
    ) -> Result<VersionStream<'a>> {
        if plan.is_empty() {
            return Ok(Box::new(std::iter::empty()));
        }
        let prefix = identity_prefix(Subspace::Version, ns, entity, id);
        let (lower, upper) = plan.time_key_bounds(&prefix);
        let scan = tx.scan(as_slice_bound(&lower), as_slice_bound(&upper), plan.direction())?;
        let entity_len = entity_prefix(Subspace::Version, ns, entity).len();
        let entries = scan.map(move |pair| {
            let (key, value) = pair?;
            let (_, timestamp, deleted) = parse_version_record(&key, &value, entity_len)?;
            Ok(VersionEntry { timestamp, deleted })
        });
        Ok(Box::new(plan.paginate(entries)))
    }

    /// Ids of `entity` whose newest version at or before `as_of` is live, in plan order
    pub fn live_identities<'a, T: KvTransaction>(
        &self,
        tx: &'a T,
        ns: &str,
        entity: &str,
        as_of: Timestamp,
        plan: &ScanPlan<String>,
    ) -> Result<IdStream<'a>> {
        if plan.is_empty() {
            return Ok(Box::new(std::iter::empty()));
        }
        let prefix = entity_prefix(Subspace::Version, ns, entity);
        let (lower, upper) = plan.id_key_bounds(&prefix);
        let scan = tx.scan(as_slice_bound(&lower), as_slice_bound(&upper), plan.direction())?;
        let ids = LiveIdentities::new(scan, prefix.len(), as_of);
        Ok(Box::new(plan.paginate(ids)))
    }

    /// Load the stored leaves of one version
    pub fn load<T: KvTransaction>(&self, tx: &T, key: &DocumentKey) -> Result<FlattenedDocument> {
        let prefix =
            content_version_prefix(key.namespace(), key.entity(), key.id(), key.timestamp());
        let (start, end) = prefix_range(&prefix);
        let mut leaves: BTreeMap<String, Vec<LeafFragment>> = BTreeMap::new();
        for pair in tx.scan(
            Bound::Included(start.as_slice()),
            Bound::Excluded(end.as_slice()),
            Direction::Forward,
        )? {
            let (k, v) = pair?;
            let mut reader = KeyReader::after(&k, prefix.len())?;
            let path = reader.str()?;
            let index = reader.u32()?;
            leaves.entry(path).or_default().push(decode_leaf(&v, index)?);
        }
        Ok(FlattenedDocument::new(key.clone(), leaves))
    }

    /// Reassemble one version; `None` if `deleted`
    pub fn read_at<T: KvTransaction>(
        &self,
        tx: &T,
        key: &DocumentKey,
        deleted: bool,
    ) -> Result<Option<JsonValue>> {
        if deleted {
            return Ok(None);
        }
        let flat = self.load(tx, key)?;
        self.codec.unflatten(&flat)
    }

    /// Reassemble a single leaf of one version
    ///
    /// Returns `None` if the version has no leaf at exactly `path`.
    pub fn read_leaf<T: KvTransaction>(
        &self,
        tx: &T,
        key: &DocumentKey,
        path: &str,
    ) -> Result<Option<JsonValue>> {
        let prefix = content_leaf_prefix(
            key.namespace(),
            key.entity(),
            key.id(),
            key.timestamp(),
            path,
        );
        let (start, end) = prefix_range(&prefix);
        let mut fragments = Vec::new();
        for pair in tx.scan(
            Bound::Included(start.as_slice()),
            Bound::Excluded(end.as_slice()),
            Direction::Forward,
        )? {
            let (k, v) = pair?;
            let index = KeyReader::after(&k, prefix.len())?.u32()?;
            fragments.push(decode_leaf(&v, index)?);
        }
        if fragments.is_empty() {
            return Ok(None);
        }
        reassemble(path, &fragments).map(Some)
    }
}

fn decode_leaf(value: &[u8], index: u32) -> Result<LeafFragment> {
    let (tag, count, chunk) = decode_fragment(value)?;
    let value_type = ValueType::from_tag(tag)
        .ok_or_else(|| Error::Corruption(format!("unknown value type tag {}", tag)))?;
    Ok(LeafFragment {
        value_type,
        index,
        count,
        bytes: chunk.to_vec(),
    })
}
