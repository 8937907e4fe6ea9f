//! Ordered key-value backend abstraction
//!
//! The version store and the link index are built entirely on these two
//! traits, so any engine that offers transactional point reads, point writes
//! and ordered range scans in both directions can host a document store.
//!
//! Keys and values are raw bytes. Ordering is byte-lexicographic.

use std::ops::Bound;

use chronodoc_core::{Direction, Result};

/// One stored key-value pair
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Lazy ordered scan result borrowed from a transaction
pub type KvScan<'a> = Box<dyn Iterator<Item = Result<KvPair>> + 'a>;

/// A transactional ordered key-value engine
pub trait KvBackend: Send + Sync {
    /// Transaction type handed out by [`begin`](KvBackend::begin)
    type Transaction: KvTransaction;

    /// Open a new transaction
    fn begin(&self, read_only: bool) -> Result<Self::Transaction>;
}

/// A single backend transaction
///
/// All reads observe the transaction's own uncommitted writes. Nothing is
/// visible to other transactions until [`commit`](KvTransaction::commit).
pub trait KvTransaction {
    /// True if writes are refused
    fn is_read_only(&self) -> bool;

    /// Point read
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Point write (insert or replace)
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Point delete; deleting a missing key is not an error
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Delete every key in `[start, end)`
    fn clear_range(&mut self, start: &[u8], end: &[u8]) -> Result<()>;

    /// Ordered scan between two bounds
    ///
    /// Keys are produced ascending for [`Direction::Forward`] and descending
    /// for [`Direction::Reverse`]. The iterator is lazy.
    fn scan<'a>(
        &'a self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        direction: Direction,
    ) -> Result<KvScan<'a>>;

    /// Make all writes durable and visible
    fn commit(self) -> Result<()>
    where
        Self: Sized;

    /// Discard all writes
    fn cancel(self) -> Result<()>
    where
        Self: Sized;
}

/// True if a `BTreeMap::range` call over these bounds is well formed
///
/// Inverted bounds, or equal bounds that are both excluded, select nothing.
pub fn bounds_are_valid(lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> bool {
    match (lower, upper) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => true,
        (Bound::Excluded(lo), Bound::Excluded(hi)) => lo < hi,
        (Bound::Included(lo), Bound::Included(hi))
        | (Bound::Included(lo), Bound::Excluded(hi))
        | (Bound::Excluded(lo), Bound::Included(hi)) => lo <= hi,
    }
}

/// Borrow an owned bound
pub fn as_slice_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(k) => Bound::Included(k.as_slice()),
        Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}
