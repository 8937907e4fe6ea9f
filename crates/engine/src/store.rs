//! Document persistence facade
//!
//! [`DocumentStore`] ties the codec, version store and link index together
//! into the operations callers use. Every operation runs inside a caller-owned
//! [`Transaction`]; cascades and index maintenance happen in that same
//! transaction, so cancelling it undoes all of them.
//!
//! # Example
//!
//! ```
//! use chronodoc_core::{DocumentKey, Specification, SpecificationElement, Timestamp};
//! use chronodoc_engine::{DocumentStore, JsonDocument, StoreConfig};
//! use chronodoc_storage::MemoryBackend;
//! use serde_json::json;
//!
//! let spec = Specification::with_managed(vec![SpecificationElement::managed(
//!     "Person",
//!     vec![SpecificationElement::string("name")],
//! )]);
//! let store = DocumentStore::new(MemoryBackend::new(), StoreConfig::default()).unwrap();
//!
//! let mut tx = store.create_transaction(false).unwrap();
//! let key = DocumentKey::new("ns", "Person", "john", Timestamp::from_micros(10));
//! store
//!     .create_or_overwrite(&mut tx, &JsonDocument::new(key, json!({"name": "John"})), &spec)
//!     .unwrap();
//! tx.commit().unwrap();
//!
//! let tx = store.create_transaction(true).unwrap();
//! let doc = store
//!     .read(&tx, Timestamp::MAX, "ns", "Person", "john")
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(doc.content(), Some(&json!({"name": "John"})));
//! ```

use std::collections::{BTreeSet, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use chronodoc_core::{
    validate_identifier, DocumentKey, Error, JsonPath, JsonValue, Range, Result, Specification,
    Timestamp,
};
use chronodoc_storage::{KvBackend, KvTransaction};

use crate::codec::{FlattenedDocument, FragmentCodec};
use crate::config::StoreConfig;
use crate::cursor::ScanPlan;
use crate::links::{extract_references, LinkIndex};
use crate::transaction::Transaction;
use crate::versions::VersionStore;

/// Transaction type of a store over backend `B`
pub type StoreTransaction<B> = Transaction<<B as KvBackend>::Transaction>;

/// Lazy stream of documents borrowed from a transaction
pub type DocumentStream<'a> = Box<dyn Iterator<Item = Result<JsonDocument>> + 'a>;

/// Lazy stream of stored versions in leaf form
pub type LeafStream<'a> = Box<dyn Iterator<Item = Result<FlattenedDocument>> + 'a>;

/// What a delete does about live documents that link to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Refuse the delete with [`Error::ReferenceConflict`]
    FailIfIncomingLinks,
    /// Delete every live referrer too, transitively
    CascadeDeleteAllIncomingLinksAndNodes,
}

/// One document version as seen by callers
#[derive(Debug, Clone, PartialEq)]
pub struct JsonDocument {
    key: DocumentKey,
    content: Option<JsonValue>,
}

impl JsonDocument {
    /// A live version
    pub fn new(key: DocumentKey, content: JsonValue) -> Self {
        JsonDocument {
            key,
            content: Some(content),
        }
    }

    /// A tombstone version
    pub fn tombstone(key: DocumentKey) -> Self {
        JsonDocument { key, content: None }
    }

    /// Version identity
    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    /// Content; `None` for tombstones
    pub fn content(&self) -> Option<&JsonValue> {
        self.content.as_ref()
    }

    /// Take the content
    pub fn into_content(self) -> Option<JsonValue> {
        self.content
    }

    /// True for tombstones
    pub fn is_deleted(&self) -> bool {
        self.content.is_none()
    }
}

/// Bitemporal, fragmenting document store over an ordered KV backend
pub struct DocumentStore<B: KvBackend> {
    backend: B,
    config: StoreConfig,
    versions: VersionStore,
    links: LinkIndex,
    next_txn_id: AtomicU64,
}

impl<B: KvBackend> DocumentStore<B> {
    /// Create a store
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` does not validate.
    pub fn new(backend: B, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let codec = FragmentCodec::new(config.fragment_capacity)?;
        debug!(
            target: "chronodoc::store",
            fragment_capacity = config.fragment_capacity,
            on_close = ?config.on_close,
            "Document store opened"
        );
        Ok(DocumentStore {
            backend,
            config,
            versions: VersionStore::new(codec),
            links: LinkIndex::new(),
            next_txn_id: AtomicU64::new(1),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Open a transaction
    pub fn create_transaction(&self, read_only: bool) -> Result<StoreTransaction<B>> {
        let id = self.next_txn_id.fetch_add(1, Ordering::Relaxed);
        let inner = self.backend.begin(read_only)?;
        Ok(Transaction::new(id, inner, self.config.on_close))
    }

    fn validate_entity(&self, ns: &str, entity: &str) -> Result<()> {
        validate_identifier("namespace", ns, self.config.max_identifier_bytes)?;
        validate_identifier("entity", entity, self.config.max_identifier_bytes)?;
        Ok(())
    }

    fn validate_identity(&self, ns: &str, entity: &str, id: &str) -> Result<()> {
        self.validate_entity(ns, entity)?;
        validate_identifier("id", id, self.config.max_identifier_bytes)?;
        Ok(())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store a document version, replacing any version at the same timestamp
    ///
    /// References are extracted and the document is flattened before anything
    /// is written, so a malformed document leaves the transaction untouched.
    pub fn create_or_overwrite(
        &self,
        tx: &mut StoreTransaction<B>,
        document: &JsonDocument,
        spec: &Specification,
    ) -> Result<()> {
        let key = document.key();
        key.validate(self.config.max_identifier_bytes)?;
        let content = document.content().ok_or_else(|| {
            Error::InvalidOperation(format!(
                "cannot write tombstone {} directly; use mark_deleted",
                key
            ))
        })?;
        let links = extract_references(content, spec, key.entity())?;
        let flat = self.versions.codec().flatten(key.clone(), content)?;

        tx.write(|kv| {
            self.links.unindex_version(kv, key)?;
            self.versions.write(kv, &flat)?;
            self.links.index(kv, key, &links)
        })?;
        debug!(
            target: "chronodoc::store",
            key = %key,
            fragments = flat.fragment_count(),
            links = links.len(),
            "Document written"
        );
        Ok(())
    }

    /// Store several documents in order; stops at the first failure
    pub fn create_or_overwrite_all<'d, I>(
        &self,
        tx: &mut StoreTransaction<B>,
        documents: I,
        spec: &Specification,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = &'d JsonDocument>,
    {
        let mut written = 0;
        for document in documents {
            self.create_or_overwrite(tx, document, spec)?;
            written += 1;
        }
        Ok(written)
    }

    /// Add a tombstone version at `timestamp`
    ///
    /// Under cascade, every live referrer is tombstoned at `timestamp`, or
    /// just after its newest version if that is later.
    pub fn mark_deleted(
        &self,
        tx: &mut StoreTransaction<B>,
        ns: &str,
        entity: &str,
        id: &str,
        timestamp: Timestamp,
        policy: DeletePolicy,
    ) -> Result<()> {
        self.validate_identity(ns, entity, id)?;
        let cascaded = tx.write(|kv| {
            let referrers = self.check_policy(kv, ns, entity, id, policy)?;
            for (source_entity, source_id) in &referrers {
                let latest = self
                    .versions
                    .latest(kv, ns, source_entity, source_id, Timestamp::MAX)?;
                if let Some(latest) = latest.filter(|v| !v.deleted) {
                    let at = timestamp.max(latest.timestamp.next());
                    let key = DocumentKey::new(ns, source_entity.as_str(), source_id.as_str(), at);
                    self.tombstone(kv, &key)?;
                }
            }
            self.tombstone(kv, &DocumentKey::new(ns, entity, id, timestamp))?;
            Ok(referrers.len())
        })?;
        debug!(
            target: "chronodoc::store",
            ns, entity, id, %timestamp, cascaded,
            "Document marked deleted"
        );
        Ok(())
    }

    /// Physically remove the version at `timestamp`
    ///
    /// Under cascade, every live referrer loses its whole history.
    pub fn delete_document(
        &self,
        tx: &mut StoreTransaction<B>,
        ns: &str,
        entity: &str,
        id: &str,
        timestamp: Timestamp,
        policy: DeletePolicy,
    ) -> Result<()> {
        self.validate_identity(ns, entity, id)?;
        let cascaded = tx.write(|kv| {
            let referrers = self.check_policy(kv, ns, entity, id, policy)?;
            for (source_entity, source_id) in &referrers {
                self.purge(kv, ns, source_entity, source_id)?;
            }
            let key = DocumentKey::new(ns, entity, id, timestamp);
            self.links.unindex_version(kv, &key)?;
            self.versions.remove_version(kv, &key)?;
            Ok(referrers.len())
        })?;
        debug!(
            target: "chronodoc::store",
            ns, entity, id, %timestamp, cascaded,
            "Document version deleted"
        );
        Ok(())
    }

    /// Physically remove every version of one document
    pub fn delete_all_versions(
        &self,
        tx: &mut StoreTransaction<B>,
        ns: &str,
        entity: &str,
        id: &str,
        policy: DeletePolicy,
    ) -> Result<()> {
        self.validate_identity(ns, entity, id)?;
        let cascaded = tx.write(|kv| {
            let referrers = self.check_policy(kv, ns, entity, id, policy)?;
            for (source_entity, source_id) in &referrers {
                self.purge(kv, ns, source_entity, source_id)?;
            }
            self.purge(kv, ns, entity, id)?;
            Ok(referrers.len())
        })?;
        debug!(
            target: "chronodoc::store",
            ns, entity, id, cascaded,
            "All document versions deleted"
        );
        Ok(())
    }

    /// Remove every document of an entity, with no policy check
    ///
    /// Links held by the removed documents are dropped. Links other entities
    /// hold to them are left in place.
    pub fn delete_all_entities(
        &self,
        tx: &mut StoreTransaction<B>,
        ns: &str,
        entity: &str,
        spec: &Specification,
    ) -> Result<()> {
        self.validate_entity(ns, entity)?;
        let holds_references = !spec.reference_paths(entity).is_empty();
        tx.write(|kv| {
            if holds_references {
                self.links.unindex_entity(kv, ns, entity)?;
            }
            self.versions.remove_entity(kv, ns, entity)
        })?;
        debug!(target: "chronodoc::store", ns, entity, "All entities deleted");
        Ok(())
    }

    fn tombstone<T: KvTransaction>(&self, kv: &mut T, key: &DocumentKey) -> Result<()> {
        self.links.unindex_version(kv, key)?;
        self.versions.write(kv, &FlattenedDocument::tombstone(key.clone()))
    }

    fn purge<T: KvTransaction>(&self, kv: &mut T, ns: &str, entity: &str, id: &str) -> Result<()> {
        self.links.unindex_identity(kv, ns, entity, id)?;
        self.versions.remove_all(kv, ns, entity, id)
    }

    /// Evaluate a delete policy; returns the documents a cascade must remove
    fn check_policy<T: KvTransaction>(
        &self,
        kv: &T,
        ns: &str,
        entity: &str,
        id: &str,
        policy: DeletePolicy,
    ) -> Result<BTreeSet<(String, String)>> {
        match policy {
            DeletePolicy::FailIfIncomingLinks => {
                let incoming = self.links.incoming(kv, &self.versions, ns, entity, id)?;
                if !incoming.is_empty() {
                    warn!(
                        target: "chronodoc::store",
                        ns, entity, id,
                        referrers = incoming.len(),
                        "Delete refused, document has incoming links"
                    );
                    return Err(Error::ReferenceConflict {
                        entity: entity.to_string(),
                        id: id.to_string(),
                        referrers: incoming.len(),
                    });
                }
                Ok(BTreeSet::new())
            }
            DeletePolicy::CascadeDeleteAllIncomingLinksAndNodes => {
                self.cascade_closure(kv, ns, entity, id)
            }
        }
    }

    /// All live documents that reach the target through incoming links
    fn cascade_closure<T: KvTransaction>(
        &self,
        kv: &T,
        ns: &str,
        entity: &str,
        id: &str,
    ) -> Result<BTreeSet<(String, String)>> {
        let root = (entity.to_string(), id.to_string());
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::from([root.clone()]);
        while let Some((target_entity, target_id)) = queue.pop_front() {
            for referrer in self
                .links
                .incoming(kv, &self.versions, ns, &target_entity, &target_id)?
            {
                if referrer != root && visited.insert(referrer.clone()) {
                    queue.push_back(referrer);
                }
            }
        }
        Ok(visited)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Newest live version at or before `as_of`
    pub fn read(
        &self,
        tx: &StoreTransaction<B>,
        as_of: Timestamp,
        ns: &str,
        entity: &str,
        id: &str,
    ) -> Result<Option<JsonDocument>> {
        self.validate_identity(ns, entity, id)?;
        read_live(tx.reader()?, &self.versions, ns, entity, id, as_of)
    }

    /// Every version of one document, tombstones included, paginated by time
    pub fn read_all_versions<'a>(
        &'a self,
        tx: &'a StoreTransaction<B>,
        ns: &str,
        entity: &str,
        id: &str,
        range: &Range<Timestamp>,
    ) -> Result<DocumentStream<'a>> {
        self.version_stream(tx, ns, entity, id, ScanPlan::new(range))
    }

    /// Versions with timestamps in `[from, to]`, paginated by time
    #[allow(clippy::too_many_arguments)]
    pub fn read_versions<'a>(
        &'a self,
        tx: &'a StoreTransaction<B>,
        from: Timestamp,
        to: Timestamp,
        ns: &str,
        entity: &str,
        id: &str,
        range: &Range<Timestamp>,
    ) -> Result<DocumentStream<'a>> {
        let plan = ScanPlan::new(range).narrow(Bound::Included(from), Bound::Included(to));
        self.version_stream(tx, ns, entity, id, plan)
    }

    fn version_stream<'a>(
        &'a self,
        tx: &'a StoreTransaction<B>,
        ns: &str,
        entity: &str,
        id: &str,
        plan: ScanPlan<Timestamp>,
    ) -> Result<DocumentStream<'a>> {
        self.validate_identity(ns, entity, id)?;
        let kv = tx.reader()?;
        let versions = self.versions;
        let entries = versions.versions(kv, ns, entity, id, &plan)?;
        let identity = DocumentKey::new(ns, entity, id, Timestamp::EPOCH);
        Ok(Box::new(entries.map(move |entry| {
            let entry = entry?;
            let key = identity.at(entry.timestamp);
            match versions.read_at(kv, &key, entry.deleted)? {
                Some(content) => Ok(JsonDocument::new(key, content)),
                None => Ok(JsonDocument::tombstone(key)),
            }
        })))
    }

    /// Live documents of one entity as of `as_of`, paginated by id
    pub fn read_documents<'a>(
        &'a self,
        tx: &'a StoreTransaction<B>,
        as_of: Timestamp,
        ns: &str,
        entity: &str,
        range: &Range<String>,
    ) -> Result<DocumentStream<'a>> {
        self.validate_entity(ns, entity)?;
        let kv = tx.reader()?;
        let versions = self.versions;
        let ids = versions.live_identities(kv, ns, entity, as_of, &ScanPlan::new(range))?;
        let (ns, entity) = (ns.to_string(), entity.to_string());
        Ok(Box::new(
            ids.map(move |id| read_live(kv, &versions, &ns, &entity, &id?, as_of))
                .filter_map(Result::transpose),
        ))
    }

    /// Same as [`read_documents`](Self::read_documents)
    pub fn find_all<'a>(
        &'a self,
        tx: &'a StoreTransaction<B>,
        as_of: Timestamp,
        ns: &str,
        entity: &str,
        range: &Range<String>,
    ) -> Result<DocumentStream<'a>> {
        self.read_documents(tx, as_of, ns, entity, range)
    }

    /// Live documents whose value at `path` equals `value`, paginated by id
    ///
    /// Values are compared after reassembly, so chunked strings match only
    /// in full. A `[]` path matches if any element equals `value`.
    #[allow(clippy::too_many_arguments)]
    pub fn find<'a>(
        &'a self,
        tx: &'a StoreTransaction<B>,
        as_of: Timestamp,
        ns: &str,
        entity: &str,
        path: &str,
        value: &JsonValue,
        range: &Range<String>,
    ) -> Result<DocumentStream<'a>> {
        self.validate_entity(ns, entity)?;
        let path: JsonPath = path.parse()?;
        let kv = tx.reader()?;
        let versions = self.versions;
        let plan = ScanPlan::new(range);
        let ids = versions.live_identities(kv, ns, entity, as_of, &plan.without_limit())?;

        let leaf_path = (!path.has_wildcard() && !value.is_object() && !value.is_array())
            .then(|| path.to_string());
        let value = value.clone();
        let (ns, entity) = (ns.to_string(), entity.to_string());

        let matches = ids
            .map(move |id| -> Result<Option<JsonDocument>> {
                let id = id?;
                let Some(latest) = versions.latest(kv, &ns, &entity, &id, as_of)? else {
                    return Ok(None);
                };
                if latest.deleted {
                    return Ok(None);
                }
                let key = DocumentKey::new(ns.as_str(), entity.as_str(), id, latest.timestamp);
                if let Some(leaf) = &leaf_path {
                    if versions.read_leaf(kv, &key, leaf)?.as_ref() != Some(&value) {
                        return Ok(None);
                    }
                    return Ok(versions
                        .read_at(kv, &key, false)?
                        .map(|content| JsonDocument::new(key, content)));
                }
                let content = versions.read_at(kv, &key, false)?;
                Ok(content
                    .filter(|json| path.select(json).into_iter().any(|v| *v == value))
                    .map(|content| JsonDocument::new(key, content)))
            })
            .filter_map(Result::transpose);
        Ok(Box::new(plan.paginate(matches)))
    }

    /// True if a live id follows `id` as of `as_of`
    pub fn has_next(
        &self,
        tx: &StoreTransaction<B>,
        as_of: Timestamp,
        ns: &str,
        entity: &str,
        id: &str,
    ) -> Result<bool> {
        self.has_neighbour(tx, as_of, ns, entity, Range::FirstAfter(1, id.to_string()))
    }

    /// True if a live id precedes `id` as of `as_of`
    pub fn has_previous(
        &self,
        tx: &StoreTransaction<B>,
        as_of: Timestamp,
        ns: &str,
        entity: &str,
        id: &str,
    ) -> Result<bool> {
        self.has_neighbour(tx, as_of, ns, entity, Range::LastBefore(1, id.to_string()))
    }

    fn has_neighbour(
        &self,
        tx: &StoreTransaction<B>,
        as_of: Timestamp,
        ns: &str,
        entity: &str,
        range: Range<String>,
    ) -> Result<bool> {
        self.validate_entity(ns, entity)?;
        let kv = tx.reader()?;
        let mut ids = self
            .versions
            .live_identities(kv, ns, entity, as_of, &ScanPlan::new(&range))?;
        Ok(ids.next().transpose()?.is_some())
    }

    /// Documents the source's live version links to along `path`, paginated by target id
    ///
    /// Targets that are not live as of `as_of` are skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn read_linked_documents<'a>(
        &'a self,
        tx: &'a StoreTransaction<B>,
        as_of: Timestamp,
        ns: &str,
        source_entity: &str,
        source_id: &str,
        path: &str,
        target_entity: &str,
        range: &Range<String>,
    ) -> Result<DocumentStream<'a>> {
        self.validate_identity(ns, source_entity, source_id)?;
        self.validate_entity(ns, target_entity)?;
        let path = path.parse::<JsonPath>()?.schema_path().to_string();
        let kv = tx.reader()?;
        let versions = self.versions;

        let source = match versions.latest(kv, ns, source_entity, source_id, as_of)? {
            Some(latest) if !latest.deleted => {
                DocumentKey::new(ns, source_entity, source_id, latest.timestamp)
            }
            _ => return Ok(Box::new(std::iter::empty())),
        };

        let plan = ScanPlan::new(range);
        let targets = self
            .links
            .targets(kv, &source, &path, target_entity, &plan.without_limit())?;
        let (ns, target_entity) = (ns.to_string(), target_entity.to_string());
        let documents = targets
            .map(move |id| read_live(kv, &versions, &ns, &target_entity, &id?, as_of))
            .filter_map(Result::transpose);
        Ok(Box::new(plan.paginate(documents)))
    }

    /// Documents of `source_entity` whose live version links to the target along `path`
    ///
    /// Paginated by source id.
    #[allow(clippy::too_many_arguments)]
    pub fn read_source_documents<'a>(
        &'a self,
        tx: &'a StoreTransaction<B>,
        as_of: Timestamp,
        ns: &str,
        target_entity: &str,
        target_id: &str,
        path: &str,
        source_entity: &str,
        range: &Range<String>,
    ) -> Result<DocumentStream<'a>> {
        self.validate_identity(ns, target_entity, target_id)?;
        self.validate_entity(ns, source_entity)?;
        let path = path.parse::<JsonPath>()?.schema_path().to_string();
        let kv = tx.reader()?;
        let versions = self.versions;

        let plan = ScanPlan::new(range);
        let sources = self.links.sources(
            kv,
            ns,
            target_entity,
            target_id,
            &path,
            source_entity,
            &plan.without_limit(),
        )?;
        let (ns, source_entity) = (ns.to_string(), source_entity.to_string());
        let documents = plan
            .ordered(sources.into_iter())
            .map(move |(id, stamps)| -> Result<Option<JsonDocument>> {
                match versions.latest(kv, &ns, &source_entity, &id, as_of)? {
                    Some(latest) if !latest.deleted && stamps.contains(&latest.timestamp) => {
                        let key = DocumentKey::new(
                            ns.as_str(),
                            source_entity.as_str(),
                            id,
                            latest.timestamp,
                        );
                        Ok(versions
                            .read_at(kv, &key, false)?
                            .map(|content| JsonDocument::new(key, content)))
                    }
                    _ => Ok(None),
                }
            })
            .filter_map(Result::transpose);
        Ok(Box::new(plan.paginate(documents)))
    }

    // =========================================================================
    // Leaf reads
    // =========================================================================

    /// Stored leaves of the newest live version at or before `as_of`
    ///
    /// Fragments are returned as stored, without reassembling the document.
    pub fn read_leaves(
        &self,
        tx: &StoreTransaction<B>,
        as_of: Timestamp,
        ns: &str,
        entity: &str,
        id: &str,
    ) -> Result<Option<FlattenedDocument>> {
        self.validate_identity(ns, entity, id)?;
        let kv = tx.reader()?;
        match live_key(kv, &self.versions, ns, entity, id, as_of)? {
            Some(key) => self.versions.load(kv, &key).map(Some),
            None => Ok(None),
        }
    }

    /// Every version of one document in leaf form, tombstones included, paginated by time
    pub fn read_all_leaf_versions<'a>(
        &'a self,
        tx: &'a StoreTransaction<B>,
        ns: &str,
        entity: &str,
        id: &str,
        range: &Range<Timestamp>,
    ) -> Result<LeafStream<'a>> {
        self.validate_identity(ns, entity, id)?;
        let kv = tx.reader()?;
        let versions = self.versions;
        let entries = versions.versions(kv, ns, entity, id, &ScanPlan::new(range))?;
        let identity = DocumentKey::new(ns, entity, id, Timestamp::EPOCH);
        Ok(Box::new(entries.map(move |entry| {
            let entry = entry?;
            let key = identity.at(entry.timestamp);
            if entry.deleted {
                Ok(FlattenedDocument::tombstone(key))
            } else {
                versions.load(kv, &key)
            }
        })))
    }

    /// Value of one leaf of the newest live version at or before `as_of`
    ///
    /// `path` must name a single leaf (`$.history.previousAddresses[1]`); only
    /// that leaf's fragments are read.
    pub fn read_leaf(
        &self,
        tx: &StoreTransaction<B>,
        as_of: Timestamp,
        ns: &str,
        entity: &str,
        id: &str,
        path: &str,
    ) -> Result<Option<JsonValue>> {
        self.validate_identity(ns, entity, id)?;
        let path: JsonPath = path.parse()?;
        if path.has_wildcard() {
            return Err(Error::InvalidOperation(format!(
                "leaf path '{}' contains a wildcard",
                path
            )));
        }
        let kv = tx.reader()?;
        match live_key(kv, &self.versions, ns, entity, id, as_of)? {
            Some(key) => self.versions.read_leaf(kv, &key, &path.to_string()),
            None => Ok(None),
        }
    }
}

impl<B: KvBackend> std::fmt::Debug for DocumentStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Key of the newest version at or before `as_of`, if that version is live
fn live_key<T: KvTransaction>(
    kv: &T,
    versions: &VersionStore,
    ns: &str,
    entity: &str,
    id: &str,
    as_of: Timestamp,
) -> Result<Option<DocumentKey>> {
    Ok(versions
        .latest(kv, ns, entity, id, as_of)?
        .filter(|latest| !latest.deleted)
        .map(|latest| DocumentKey::new(ns, entity, id, latest.timestamp)))
}

/// Newest live version of one document at or before `as_of`
fn read_live<T: KvTransaction>(
    kv: &T,
    versions: &VersionStore,
    ns: &str,
    entity: &str,
    id: &str,
    as_of: Timestamp,
) -> Result<Option<JsonDocument>> {
    let Some(key) = live_key(kv, versions, ns, entity, id, as_of)? else {
        return Ok(None);
    };
    Ok(versions
        .read_at(kv, &key, false)?
        .map(|content| JsonDocument::new(key, content)))
}
