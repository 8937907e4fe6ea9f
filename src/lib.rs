//! chronodoc - Bitemporal JSON document store
//!
//! chronodoc keeps every version of every JSON document, splits large scalar
//! values into bounded fragments, and maintains forward and backward link
//! indexes derived from a schema. It runs on any ordered, transactional
//! key-value backend.
//!
//! # Quick Start
//!
//! ```
//! use chronodoc::{
//!     DocumentKey, DocumentStore, JsonDocument, MemoryBackend, Specification,
//!     SpecificationElement, StoreConfig, Timestamp,
//! };
//! use serde_json::json;
//!
//! let spec = Specification::with_managed(vec![SpecificationElement::managed(
//!     "Person",
//!     vec![SpecificationElement::string("name")],
//! )]);
//! let store = DocumentStore::new(MemoryBackend::new(), StoreConfig::default())?;
//!
//! let mut tx = store.create_transaction(false)?;
//! let key = DocumentKey::new("acme", "Person", "ada", Timestamp::from_micros(1));
//! store.create_or_overwrite(&mut tx, &JsonDocument::new(key, json!({"name": "Ada"})), &spec)?;
//! tx.commit()?;
//! # Ok::<(), chronodoc::Error>(())
//! ```
//!
//! # Architecture
//!
//! - [`chronodoc_core`]: keys, timestamps, paths, ranges, specification, errors
//! - [`chronodoc_storage`]: the ordered-KV contract and the in-memory backend
//! - [`chronodoc_engine`]: codec, version store, link index and [`DocumentStore`]

pub use chronodoc_core::{
    validate_identifier, Direction, DocumentKey, ElementType, Error, JsonPath, JsonType,
    JsonValue, KeyError, PathParseError, PathSegment, Range, ReferencePath, Result,
    Specification, SpecificationElement, Timestamp, DEFAULT_MAX_IDENTIFIER_BYTES,
};
pub use chronodoc_engine::{
    CloseBehavior, DeletePolicy, DocumentStore, DocumentStream, FlattenedDocument, FragmentCodec,
    JsonDocument, LeafFragment, LeafStream, StoreConfig, StoreTransaction, Transaction,
    TransactionStatus, ValueType, CONFIG_FILE_NAME, DEFAULT_FRAGMENT_CAPACITY,
};
pub use chronodoc_storage::{KvBackend, KvTransaction, MemoryBackend};
