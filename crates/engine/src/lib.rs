//! Document engine for chronodoc
//!
//! This crate turns an ordered key-value backend into a bitemporal JSON
//! document store:
//! - codec: Flattening documents into size-bounded leaf fragments and back
//! - keyspace: Order-preserving key layout for the four subspaces
//! - versions: Version records and fragment storage per document
//! - links: Reference extraction and forward/backward link indexes
//! - cursor: Range windows turned into bounded, directed scans
//! - transaction: Caller-owned transaction handles with close behavior
//! - store: The `DocumentStore` facade tying them together
//! - config: `chronodoc.toml` loading and validation
//!
//! The engine is the only component that knows about:
//! - How documents map onto keys
//! - Link maintenance across versions
//! - Delete policies and cascades

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod cursor;
pub mod keyspace;
pub mod links;
pub mod store;
pub mod transaction;
pub mod versions;

pub use codec::{
    FlattenedDocument, FragmentCodec, LeafFragment, ValueType, DEFAULT_FRAGMENT_CAPACITY,
    MIN_FRAGMENT_CAPACITY,
};
pub use config::{CloseBehavior, StoreConfig, CONFIG_FILE_NAME};
pub use cursor::ScanPlan;
pub use links::{extract_references, Link, LinkIndex, Referrer};
pub use store::{
    DeletePolicy, DocumentStore, DocumentStream, JsonDocument, LeafStream, StoreTransaction,
};
pub use transaction::{Transaction, TransactionStatus};
pub use versions::{VersionEntry, VersionStore};
