//! Storage layer for chronodoc
//!
//! This crate defines the ordered key-value abstraction the document store is
//! built on, and ships one implementation of it:
//! - KvBackend / KvTransaction: transactional byte-ordered KV contract
//! - MemoryBackend: BTreeMap-based engine with `parking_lot::RwLock`
//! - Snapshot: Arc-shared point-in-time view used for transaction isolation
//!
//! Other engines (distributed KV stores, relational tables) plug in by
//! implementing the two traits.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod memory;
pub mod snapshot;

pub use backend::{as_slice_bound, bounds_are_valid, KvBackend, KvPair, KvScan, KvTransaction};
pub use memory::{MemoryBackend, MemoryTransaction};
pub use snapshot::Snapshot;
