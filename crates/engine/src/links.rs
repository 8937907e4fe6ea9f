//! Reference graph
//!
//! Every live version that holds references is indexed twice:
//!
//! - **forward**: `source version -> (path, target)`, so a version's outgoing
//!   links can be listed and dropped when the version is replaced or removed;
//! - **backward**: `target -> (path, source version)`, so incoming links can be
//!   found without scanning every document.
//!
//! Entries are per source version. A link counts as incoming only while the
//! source's newest version is live and is the version that wrote the entry.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use chronodoc_core::{
    DocumentKey, Direction, Error, JsonPath, JsonValue, Result, Specification, Timestamp,
};
use chronodoc_storage::{as_slice_bound, KvTransaction};

use crate::cursor::ScanPlan;
use crate::keyspace::{
    backward_source_prefix, entity_prefix, forward_target_prefix, forward_version_prefix,
    identity_prefix, prefix_range, KeyBuilder, KeyReader, Subspace,
};
use crate::versions::VersionStore;

/// One outgoing reference of a document version
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Link {
    /// Schema path of the reference element
    pub path: JsonPath,
    /// Entity the reference points at
    pub target_entity: String,
    /// Id the reference points at
    pub target_id: String,
}

/// Parse a reference value of the form `/<Entity>/<id>`
pub fn parse_reference(value: &str) -> Option<(&str, &str)> {
    let (entity, id) = value.strip_prefix('/')?.split_once('/')?;
    let valid = |s: &str| !s.is_empty() && !s.contains('\0');
    (valid(entity) && valid(id)).then_some((entity, id))
}

/// Collect the references a document of `entity` holds
///
/// Reference locations come from the specification. `null` references are
/// skipped; anything else that is not a well-formed reference to an allowed
/// entity is rejected.
pub fn extract_references(
    json: &JsonValue,
    spec: &Specification,
    entity: &str,
) -> Result<BTreeSet<Link>> {
    let mut links = BTreeSet::new();
    for reference in spec.reference_paths(entity) {
        for value in reference.path.select(json) {
            let invalid = || Error::InvalidReference {
                path: reference.path.to_string(),
                value: value.to_string(),
            };
            let text = match value {
                JsonValue::Null => continue,
                JsonValue::String(s) => s,
                _ => return Err(invalid()),
            };
            let (target_entity, target_id) = parse_reference(text).ok_or_else(invalid)?;
            if !reference.ref_types.is_empty() && !reference.ref_types.contains(target_entity) {
                return Err(invalid());
            }
            links.insert(Link {
                path: reference.path.clone(),
                target_entity: target_entity.to_string(),
                target_id: target_id.to_string(),
            });
        }
    }
    Ok(links)
}

/// A backward entry: which source version links to a target along a path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Referrer {
    /// Schema path text of the link
    pub path: String,
    /// Source entity
    pub entity: String,
    /// Source id
    pub id: String,
    /// Source version timestamp
    pub timestamp: Timestamp,
}

/// Forward and backward link entries over an ordered KV transaction
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkIndex;

impl LinkIndex {
    /// Create the index
    pub fn new() -> Self {
        LinkIndex
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Record the links of one source version
    pub fn index<T: KvTransaction>(
        &self,
        tx: &mut T,
        source: &DocumentKey,
        links: &BTreeSet<Link>,
    ) -> Result<()> {
        for link in links {
            let path = link.path.to_string();
            tx.put(&forward_key(source, &path, &link.target_entity, &link.target_id), &[])?;
            tx.put(
                &backward_key(
                    source.namespace(),
                    &link.target_entity,
                    &link.target_id,
                    &path,
                    source.entity(),
                    source.id(),
                    source.timestamp(),
                ),
                &[],
            )?;
        }
        Ok(())
    }

    /// Drop the links of one source version
    pub fn unindex_version<T: KvTransaction>(
        &self,
        tx: &mut T,
        source: &DocumentKey,
    ) -> Result<()> {
        let prefix = forward_version_prefix(
            source.namespace(),
            source.entity(),
            source.id(),
            source.timestamp(),
        );
        let mut backward = Vec::new();
        for (path, target_entity, target_id) in self.forward_entries(tx, &prefix)? {
            backward.push(backward_key(
                source.namespace(),
                &target_entity,
                &target_id,
                &path,
                source.entity(),
                source.id(),
                source.timestamp(),
            ));
        }
        drop_entries(tx, &prefix, backward)
    }

    /// Drop the links of every version of one source document
    pub fn unindex_identity<T: KvTransaction>(
        &self,
        tx: &mut T,
        ns: &str,
        entity: &str,
        id: &str,
    ) -> Result<()> {
        let prefix = identity_prefix(Subspace::Forward, ns, entity, id);
        let mut backward = Vec::new();
        for pair in scan_prefix(tx, &prefix)? {
            let (key, _) = pair?;
            let mut reader = KeyReader::after(&key, prefix.len())?;
            let ts = reader.ts()?;
            let path = reader.str()?;
            let target_entity = reader.str()?;
            let target_id = reader.str()?;
            backward.push(backward_key(ns, &target_entity, &target_id, &path, entity, id, ts));
        }
        drop_entries(tx, &prefix, backward)
    }

    /// Drop the links of every document of one source entity
    pub fn unindex_entity<T: KvTransaction>(
        &self,
        tx: &mut T,
        ns: &str,
        entity: &str,
    ) -> Result<()> {
        let prefix = entity_prefix(Subspace::Forward, ns, entity);
        let mut backward = Vec::new();
        for pair in scan_prefix(tx, &prefix)? {
            let (key, _) = pair?;
            let mut reader = KeyReader::after(&key, prefix.len())?;
            let id = reader.str()?;
            let ts = reader.ts()?;
            let path = reader.str()?;
            let target_entity = reader.str()?;
            let target_id = reader.str()?;
            backward.push(backward_key(ns, &target_entity, &target_id, &path, entity, &id, ts));
        }
        drop_entries(tx, &prefix, backward)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Target ids one source version links to along `path`, in plan order
    pub fn targets<'a, T: KvTransaction>(
        &self,
        tx: &'a T,
        source: &DocumentKey,
        path: &str,
        target_entity: &str,
        plan: &ScanPlan<String>,
    ) -> Result<Box<dyn Iterator<Item = Result<String>> + 'a>> {
        if plan.is_empty() {
            return Ok(Box::new(std::iter::empty()));
        }
        let prefix = forward_target_prefix(
            source.namespace(),
            source.entity(),
            source.id(),
            source.timestamp(),
            path,
            target_entity,
        );
        let (lower, upper) = plan.id_key_bounds(&prefix);
        let prefix_len = prefix.len();
        let scan = tx.scan(as_slice_bound(&lower), as_slice_bound(&upper), plan.direction())?;
        Ok(Box::new(scan.map(move |pair| {
            let (key, _) = pair?;
            KeyReader::after(&key, prefix_len)?.str()
        })))
    }

    /// Source versions of `source_entity` linking to a target along `path`
    ///
    /// Grouped by source id within the plan's bounds; each id maps to the
    /// timestamps of the versions holding such a link.
    #[allow(clippy::too_many_arguments)]
    pub fn sources<T: KvTransaction>(
        &self,
        tx: &T,
        ns: &str,
        target_entity: &str,
        target_id: &str,
        path: &str,
        source_entity: &str,
        plan: &ScanPlan<String>,
    ) -> Result<BTreeMap<String, BTreeSet<Timestamp>>> {
        let mut grouped: BTreeMap<String, BTreeSet<Timestamp>> = BTreeMap::new();
        if plan.is_empty() {
            return Ok(grouped);
        }
        let prefix = backward_source_prefix(ns, target_entity, target_id, path, source_entity);
        let (lower, upper) = plan.id_key_bounds(&prefix);
        for pair in tx.scan(as_slice_bound(&lower), as_slice_bound(&upper), Direction::Forward)? {
            let (key, _) = pair?;
            let mut reader = KeyReader::after(&key, prefix.len())?;
            let id = reader.str()?;
            let ts = reader.ts()?;
            grouped.entry(id).or_default().insert(ts);
        }
        Ok(grouped)
    }

    /// Every backward entry pointing at one target
    pub fn referrers<T: KvTransaction>(
        &self,
        tx: &T,
        ns: &str,
        entity: &str,
        id: &str,
    ) -> Result<Vec<Referrer>> {
        let prefix = identity_prefix(Subspace::Backward, ns, entity, id);
        let mut out = Vec::new();
        for pair in scan_prefix(tx, &prefix)? {
            let (key, _) = pair?;
            let mut reader = KeyReader::after(&key, prefix.len())?;
            out.push(Referrer {
                path: reader.str()?,
                entity: reader.str()?,
                id: reader.str()?,
                timestamp: reader.ts()?,
            });
        }
        Ok(out)
    }

    /// Distinct live documents currently linking to one target
    ///
    /// A backward entry counts only if its source's newest version is live and
    /// is the version that wrote the entry. The target itself is never counted.
    /// Entries of tombstoned or overwritten versions stay in the index as
    /// history and are filtered out here.
    pub fn incoming<T: KvTransaction>(
        &self,
        tx: &T,
        versions: &VersionStore,
        ns: &str,
        entity: &str,
        id: &str,
    ) -> Result<BTreeSet<(String, String)>> {
        let mut candidates: BTreeMap<(String, String), BTreeSet<Timestamp>> = BTreeMap::new();
        for referrer in self.referrers(tx, ns, entity, id)? {
            if referrer.entity == entity && referrer.id == id {
                continue;
            }
            candidates
                .entry((referrer.entity, referrer.id))
                .or_default()
                .insert(referrer.timestamp);
        }

        let mut live = BTreeSet::new();
        for ((source_entity, source_id), stamps) in candidates {
            let current = versions.latest(tx, ns, &source_entity, &source_id, Timestamp::MAX)?;
            if let Some(version) = current {
                if !version.deleted && stamps.contains(&version.timestamp) {
                    live.insert((source_entity, source_id));
                }
            }
        }
        Ok(live)
    }

    fn forward_entries<T: KvTransaction>(
        &self,
        tx: &T,
        prefix: &[u8],
    ) -> Result<Vec<(String, String, String)>> {
        let mut out = Vec::new();
        for pair in scan_prefix(tx, prefix)? {
            let (key, _) = pair?;
            let mut reader = KeyReader::after(&key, prefix.len())?;
            out.push((reader.str()?, reader.str()?, reader.str()?));
        }
        Ok(out)
    }
}

fn forward_key(source: &DocumentKey, path: &str, target_entity: &str, target_id: &str) -> Vec<u8> {
    KeyBuilder::new(Subspace::Forward)
        .str(source.namespace())
        .str(source.entity())
        .str(source.id())
        .ts(source.timestamp())
        .str(path)
        .str(target_entity)
        .str(target_id)
        .build()
}

fn backward_key(
    ns: &str,
    target_entity: &str,
    target_id: &str,
    path: &str,
    source_entity: &str,
    source_id: &str,
    ts: Timestamp,
) -> Vec<u8> {
    KeyBuilder::new(Subspace::Backward)
        .str(ns)
        .str(target_entity)
        .str(target_id)
        .str(path)
        .str(source_entity)
        .str(source_id)
        .ts(ts)
        .build()
}

fn scan_prefix<'a, T: KvTransaction>(
    tx: &'a T,
    prefix: &[u8],
) -> Result<chronodoc_storage::KvScan<'a>> {
    let (start, end) = prefix_range(prefix);
    tx.scan(
        Bound::Included(start.as_slice()),
        Bound::Excluded(end.as_slice()),
        Direction::Forward,
    )
}

fn drop_entries<T: KvTransaction>(
    tx: &mut T,
    forward_prefix: &[u8],
    backward: Vec<Vec<u8>>,
) -> Result<()> {
    for key in backward {
        tx.delete(&key)?;
    }
    let (start, end) = prefix_range(forward_prefix);
    tx.clear_range(&start, &end)
}
