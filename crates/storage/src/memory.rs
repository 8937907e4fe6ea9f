//! MemoryBackend: in-process ordered KV engine with snapshot transactions
//!
//! This module implements [`KvBackend`] using:
//! - `BTreeMap<Vec<u8>, Vec<u8>>` for byte-ordered storage
//! - `parking_lot::RwLock` around the committed state
//! - `Arc` snapshots so a transaction reads a stable view without copying
//!
//! # Isolation
//!
//! Each transaction reads from the snapshot taken at `begin` plus its own
//! write buffer (read-your-writes). Commit is first-committer-wins: if any key
//! in the write buffer was committed by another transaction after this one
//! began, the commit fails with [`Error::TransactionConflict`] and nothing is
//! applied. Keys inserted by others into a range this transaction cleared are
//! not detected (no phantom protection).
//!
//! Commit versions per key are kept only while an open writable transaction
//! could still conflict with them: every commit prunes entries at or below
//! the oldest start version still open.

use std::collections::{BTreeMap, HashMap};
use std::iter::Peekable;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use chronodoc_core::{Direction, Error, Result};

use crate::backend::{bounds_are_valid, KvBackend, KvScan, KvTransaction};
use crate::snapshot::Snapshot;

#[derive(Debug, Default)]
struct CommittedState {
    data: Arc<BTreeMap<Vec<u8>, Vec<u8>>>,
    version: u64,
    last_modified: HashMap<Vec<u8>, u64>,
    /// Open writable transactions by start version
    open_writers: BTreeMap<u64, usize>,
}

impl CommittedState {
    fn register(&mut self, version: u64) {
        *self.open_writers.entry(version).or_insert(0) += 1;
    }

    fn release(&mut self, version: u64) {
        if let Some(count) = self.open_writers.get_mut(&version) {
            *count -= 1;
            if *count == 0 {
                self.open_writers.remove(&version);
            }
        }
    }

    /// Drop commit versions no open writer can conflict with
    fn prune(&mut self) {
        let horizon = self
            .open_writers
            .keys()
            .next()
            .copied()
            .unwrap_or(self.version);
        self.last_modified.retain(|_, modified| *modified > horizon);
    }
}

/// In-memory ordered KV engine
///
/// Cloning is cheap and shares the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<CommittedState>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Current committed state
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        Snapshot::new(state.version, Arc::clone(&state.data))
    }
}

impl KvBackend for MemoryBackend {
    type Transaction = MemoryTransaction;

    fn begin(&self, read_only: bool) -> Result<MemoryTransaction> {
        let snapshot = {
            let mut state = self.state.write();
            if !read_only {
                let version = state.version;
                state.register(version);
            }
            Snapshot::new(state.version, Arc::clone(&state.data))
        };
        debug!(
            target: "chronodoc::kv",
            version = snapshot.version(),
            read_only,
            "Transaction started"
        );
        Ok(MemoryTransaction {
            state: Arc::clone(&self.state),
            snapshot,
            writes: BTreeMap::new(),
            read_only,
            open: !read_only,
        })
    }
}

/// Transaction over a [`MemoryBackend`]
///
/// `None` in the write buffer marks a pending delete.
#[derive(Debug)]
pub struct MemoryTransaction {
    state: Arc<RwLock<CommittedState>>,
    snapshot: Snapshot,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    read_only: bool,
    /// Still counted in `open_writers`
    open: bool,
}

impl MemoryTransaction {
    /// Commit version of the snapshot this transaction reads
    pub fn start_version(&self) -> u64 {
        self.snapshot.version()
    }

    /// Number of buffered writes and deletes
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnlyTransaction);
        }
        Ok(())
    }

    fn release(&mut self, state: &mut CommittedState) {
        if self.open {
            state.release(self.snapshot.version());
            self.open = false;
        }
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.open {
            let state = Arc::clone(&self.state);
            self.release(&mut state.write());
        }
    }
}

impl KvTransaction for MemoryTransaction {
    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(buffered) = self.writes.get(key) {
            return Ok(buffered.clone());
        }
        Ok(self.snapshot.get(key).map(<[u8]>::to_vec))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }

    fn clear_range(&mut self, start: &[u8], end: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        if start >= end {
            return Ok(());
        }
        for key in self.snapshot.keys_in(start, end) {
            self.writes.insert(key, None);
        }
        for (_, pending) in self
            .writes
            .range_mut::<[u8], _>((Bound::Included(start), Bound::Excluded(end)))
        {
            *pending = None;
        }
        Ok(())
    }

    fn scan<'a>(
        &'a self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        direction: Direction,
    ) -> Result<KvScan<'a>> {
        let base = self.snapshot.range(lower, upper, direction);
        let overlay: Box<dyn Iterator<Item = (&'a Vec<u8>, &'a Option<Vec<u8>>)> + 'a> =
            if !bounds_are_valid(lower, upper) {
                Box::new(std::iter::empty())
            } else {
                let iter = self.writes.range::<[u8], _>((lower, upper));
                match direction {
                    Direction::Forward => Box::new(iter),
                    Direction::Reverse => Box::new(iter.rev()),
                }
            };
        Ok(Box::new(MergedScan {
            base: base.peekable(),
            overlay: overlay.peekable(),
            direction,
        }))
    }

    fn commit(mut self) -> Result<()> {
        if self.writes.is_empty() {
            debug!(target: "chronodoc::kv", "Empty transaction committed");
            return Ok(());
        }
        self.ensure_writable()?;

        let shared = Arc::clone(&self.state);
        let mut guard = shared.write();
        let state = &mut *guard;
        self.release(state);
        let start_version = self.snapshot.version();

        for key in self.writes.keys() {
            if let Some(&modified) = state.last_modified.get(key) {
                if modified > start_version {
                    warn!(
                        target: "chronodoc::kv",
                        start_version,
                        modified,
                        "Write-write conflict, commit refused"
                    );
                    return Err(Error::TransactionConflict(format!(
                        "key modified at version {} after transaction start {}",
                        modified, start_version
                    )));
                }
            }
        }

        state.version += 1;
        let version = state.version;
        let data = Arc::make_mut(&mut state.data);
        let count = self.writes.len();
        for (key, value) in std::mem::take(&mut self.writes) {
            match value {
                Some(value) => {
                    data.insert(key.clone(), value);
                }
                None => {
                    data.remove(&key);
                }
            }
            state.last_modified.insert(key, version);
        }
        state.prune();

        debug!(target: "chronodoc::kv", version, writes = count, "Transaction committed");
        Ok(())
    }

    fn cancel(self) -> Result<()> {
        debug!(
            target: "chronodoc::kv",
            discarded = self.writes.len(),
            "Transaction cancelled"
        );
        Ok(())
    }
}

/// Merge of committed snapshot data with the transaction's write buffer
///
/// Both inputs are ordered the same way. On equal keys the buffer wins and a
/// buffered delete hides the committed pair.
struct MergedScan<'a> {
    base: Peekable<Box<dyn Iterator<Item = (&'a Vec<u8>, &'a Vec<u8>)> + 'a>>,
    overlay: Peekable<Box<dyn Iterator<Item = (&'a Vec<u8>, &'a Option<Vec<u8>>)> + 'a>>,
    direction: Direction,
}

enum Side {
    Base,
    Overlay,
}

impl<'a> Iterator for MergedScan<'a> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let side = match (self.base.peek(), self.overlay.peek()) {
                (None, None) => return None,
                (Some(_), None) => Side::Base,
                (None, Some(_)) => Side::Overlay,
                (Some((base_key, _)), Some((overlay_key, _))) => {
                    let ord = match self.direction {
                        Direction::Forward => base_key.cmp(overlay_key),
                        Direction::Reverse => overlay_key.cmp(base_key),
                    };
                    match ord {
                        std::cmp::Ordering::Less => Side::Base,
                        std::cmp::Ordering::Greater => Side::Overlay,
                        std::cmp::Ordering::Equal => {
                            self.base.next();
                            Side::Overlay
                        }
                    }
                }
            };

            match side {
                Side::Base => {
                    let (key, value) = self.base.next()?;
                    return Some(Ok((key.clone(), value.clone())));
                }
                Side::Overlay => {
                    let (key, value) = self.overlay.next()?;
                    if let Some(value) = value {
                        return Some(Ok((key.clone(), value.clone())));
                    }
                }
            }
        }
    }
}
