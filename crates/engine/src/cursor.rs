//! Range cursor engine
//!
//! Turns a [`Range`] into a [`ScanPlan`]: key bounds, a direction and an
//! optional limit. Plans translate into byte bounds over the key layout and
//! paginate any ordered stream.
//!
//! [`LiveIdentities`] walks the version records of one entity and yields each
//! id whose newest version at or before `as_of` is live.

use std::cmp::Ordering;
use std::ops::Bound;

use chronodoc_core::{Direction, Range, Result, Timestamp};
use chronodoc_storage::KvScan;

use crate::keyspace::{decode_version_flag, id_bounds, time_bounds, KeyReader};

/// Bounds, direction and limit of one ordered query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan<K> {
    lower: Bound<K>,
    upper: Bound<K>,
    direction: Direction,
    limit: Option<usize>,
}

impl<K: Ord + Clone> ScanPlan<K> {
    /// Plan for a pagination window
    pub fn new(range: &Range<K>) -> Self {
        ScanPlan {
            lower: range.lower_bound().cloned(),
            upper: range.upper_bound().cloned(),
            direction: range.direction(),
            limit: range.limit(),
        }
    }

    /// Intersect the plan with another pair of bounds
    pub fn narrow(mut self, lower: Bound<K>, upper: Bound<K>) -> Self {
        self.lower = tighter(self.lower, lower, Ordering::Greater);
        self.upper = tighter(self.upper, upper, Ordering::Less);
        self
    }

    /// Lower bound
    pub fn lower(&self) -> Bound<&K> {
        self.lower.as_ref()
    }

    /// Upper bound
    pub fn upper(&self) -> Bound<&K> {
        self.upper.as_ref()
    }

    /// Scan direction
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Maximum number of results
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// True if the plan can never produce a result
    pub fn is_empty(&self) -> bool {
        if self.limit == Some(0) {
            return true;
        }
        match (&self.lower, &self.upper) {
            (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
            (Bound::Included(lo), Bound::Excluded(hi))
            | (Bound::Excluded(lo), Bound::Included(hi))
            | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
            _ => false,
        }
    }

    /// Same bounds and direction, no limit
    ///
    /// Used when results are filtered after the scan and paginated afterwards.
    pub fn without_limit(&self) -> Self {
        ScanPlan {
            limit: None,
            ..self.clone()
        }
    }

    /// Apply the limit to an already ordered and bounded stream
    pub fn paginate<I: Iterator>(&self, iter: I) -> std::iter::Take<I> {
        iter.take(self.limit.unwrap_or(usize::MAX))
    }

    /// Iterate an ascending collection in plan order
    pub fn ordered<'a, T, I>(&self, items: I) -> Box<dyn Iterator<Item = T> + 'a>
    where
        I: DoubleEndedIterator<Item = T> + 'a,
    {
        match self.direction {
            Direction::Forward => Box::new(items),
            Direction::Reverse => Box::new(items.rev()),
        }
    }
}

/// Keep whichever bound is stricter; `wins` is the ordering of the stricter value
fn tighter<K: Ord>(a: Bound<K>, b: Bound<K>, wins: Ordering) -> Bound<K> {
    let a_is_tighter = match (edge(&a), edge(&b)) {
        (None, _) => false,
        (_, None) => true,
        (Some((av, a_excl)), Some((bv, b_excl))) => match av.cmp(bv) {
            Ordering::Equal => a_excl || !b_excl,
            ord => ord == wins,
        },
    };
    if a_is_tighter {
        a
    } else {
        b
    }
}

fn edge<K>(bound: &Bound<K>) -> Option<(&K, bool)> {
    match bound {
        Bound::Included(k) => Some((k, false)),
        Bound::Excluded(k) => Some((k, true)),
        Bound::Unbounded => None,
    }
}

impl ScanPlan<String> {
    /// Byte bounds over `prefix id \0 ...` keys
    pub fn id_key_bounds(&self, prefix: &[u8]) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
        id_bounds(prefix, str_bound(&self.lower), str_bound(&self.upper))
    }
}

impl ScanPlan<Timestamp> {
    /// Byte bounds over `prefix ts` keys
    pub fn time_key_bounds(&self, prefix: &[u8]) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
        time_bounds(prefix, self.lower.as_ref(), self.upper.as_ref())
    }
}

fn str_bound(bound: &Bound<String>) -> Bound<&str> {
    match bound {
        Bound::Included(s) => Bound::Included(s.as_str()),
        Bound::Excluded(s) => Bound::Excluded(s.as_str()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Decode a version record under an entity prefix into `(id, ts, tombstone)`
pub(crate) fn parse_version_record(
    key: &[u8],
    value: &[u8],
    prefix_len: usize,
) -> Result<(String, Timestamp, bool)> {
    let mut reader = KeyReader::after(key, prefix_len)?;
    let id = reader.str()?;
    let ts = reader.ts()?;
    Ok((id, ts, decode_version_flag(value)?))
}

/// Ids of one entity that are live at a point in time
///
/// Consumes a scan over the entity's version records (either direction) and
/// groups consecutive records by id.
pub struct LiveIdentities<'a> {
    scan: KvScan<'a>,
    prefix_len: usize,
    as_of: Timestamp,
    current: Option<(String, Option<(Timestamp, bool)>)>,
    done: bool,
}

impl<'a> LiveIdentities<'a> {
    /// Wrap a version-record scan whose keys start with `prefix_len` bytes of entity prefix
    pub fn new(scan: KvScan<'a>, prefix_len: usize, as_of: Timestamp) -> Self {
        LiveIdentities {
            scan,
            prefix_len,
            as_of,
            current: None,
            done: false,
        }
    }

    fn fail(&mut self, err: chronodoc_core::Error) -> Option<Result<String>> {
        self.done = true;
        Some(Err(err))
    }
}

/// Track the newest record at or before `as_of`
fn fold(best: &mut Option<(Timestamp, bool)>, ts: Timestamp, tombstone: bool, as_of: Timestamp) {
    if ts <= as_of && best.map_or(true, |(b, _)| ts > b) {
        *best = Some((ts, tombstone));
    }
}

fn live(group: Option<(String, Option<(Timestamp, bool)>)>) -> Option<String> {
    match group {
        Some((id, Some((_, false)))) => Some(id),
        _ => None,
    }
}

impl<'a> Iterator for LiveIdentities<'a> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let (key, value) = match self.scan.next() {
                Some(Ok(pair)) => pair,
                Some(Err(e)) => return self.fail(e),
                None => {
                    self.done = true;
                    return live(self.current.take()).map(Ok);
                }
            };
            let (id, ts, tombstone) = match parse_version_record(&key, &value, self.prefix_len) {
                Ok(record) => record,
                Err(e) => return self.fail(e),
            };
            let same = matches!(&self.current, Some((current, _)) if *current == id);
            if same {
                if let Some((_, best)) = &mut self.current {
                    fold(best, ts, tombstone, self.as_of);
                }
                continue;
            }
            let mut best = None;
            fold(&mut best, ts, tombstone, self.as_of);
            if let Some(id) = live(self.current.replace((id, best))) {
                return Some(Ok(id));
            }
        }
    }
}
