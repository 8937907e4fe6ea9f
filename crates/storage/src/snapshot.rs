//! Point-in-time views of the memory backend
//!
//! A [`Snapshot`] shares the committed map through an `Arc`. Taking one is
//! O(1); the map is only copied when a later commit mutates it while the
//! snapshot is still alive (`Arc::make_mut`).

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use chronodoc_core::Direction;

use crate::backend::bounds_are_valid;

/// Committed data at one commit version
///
/// # Example
///
/// ```
/// use chronodoc_storage::{KvBackend, KvTransaction, MemoryBackend};
///
/// let backend = MemoryBackend::new();
/// let before = backend.snapshot();
///
/// let mut tx = backend.begin(false).unwrap();
/// tx.put(b"k", b"v").unwrap();
/// tx.commit().unwrap();
///
/// assert!(before.get(b"k").is_none());
/// assert_eq!(backend.snapshot().get(b"k"), Some(&b"v"[..]));
/// ```
#[derive(Debug, Clone)]
pub struct Snapshot {
    version: u64,
    data: Arc<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl Snapshot {
    pub(crate) fn new(version: u64, data: Arc<BTreeMap<Vec<u8>, Vec<u8>>>) -> Self {
        Snapshot { version, data }
    }

    /// Commit version this snapshot reflects
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the snapshot holds no keys
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Point read
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    /// Keys in `[start, end)`
    pub(crate) fn keys_in(&self, start: &[u8], end: &[u8]) -> Vec<Vec<u8>> {
        self.range(Bound::Included(start), Bound::Excluded(end), Direction::Forward)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Ordered iteration between two bounds
    pub fn range<'a>(
        &'a self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        direction: Direction,
    ) -> Box<dyn Iterator<Item = (&'a Vec<u8>, &'a Vec<u8>)> + 'a> {
        if !bounds_are_valid(lower, upper) {
            return Box::new(std::iter::empty());
        }
        let iter = self.data.range::<[u8], _>((lower, upper));
        match direction {
            Direction::Forward => Box::new(iter),
            Direction::Reverse => Box::new(iter.rev()),
        }
    }
}
