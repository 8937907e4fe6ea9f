//! Pagination windows over an ordered key domain
//!
//! A [`Range`] describes which slice of an ordered domain a query wants and in
//! which direction. The same type drives identity-ordered queries (`Range<String>`
//! over document ids) and time-ordered queries (`Range<Timestamp>` over versions).
//!
//! | Variant | Direction | Bounds | Limit |
//! |---------|-----------|--------|-------|
//! | `Unbounded` | ascending | none | none |
//! | `First(n)` | ascending | none | `n` |
//! | `FirstAfter(n, c)` | ascending | `> c` | `n` |
//! | `FirstBetween(n, lo, hi)` | ascending | `> lo`, `< hi` | `n` |
//! | `Last(n)` | descending | none | `n` |
//! | `LastBefore(n, c)` | descending | `< c` | `n` |
//! | `LastBetween(n, lo, hi)` | descending | `> lo`, `< hi` | `n` |
//! | `Between(lo, hi)` | ascending | `>= lo`, `<= hi` | none |

use serde::{Deserialize, Serialize};
use std::ops::Bound;

/// Scan direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Direction {
    /// Smallest key first
    #[default]
    Forward,
    /// Largest key first
    Reverse,
}

/// A pagination window over one ordered key domain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Range<K> {
    /// Everything, ascending
    #[default]
    Unbounded,
    /// The first `n` keys, ascending
    First(usize),
    /// The first `n` keys strictly after the cursor, ascending
    FirstAfter(usize, K),
    /// The first `n` keys strictly between `lo` and `hi`, ascending
    FirstBetween(usize, K, K),
    /// The last `n` keys, descending
    Last(usize),
    /// The last `n` keys strictly before the cursor, descending
    LastBefore(usize, K),
    /// The last `n` keys strictly between `lo` and `hi`, descending
    LastBetween(usize, K, K),
    /// Every key in the closed interval `[lo, hi]`, ascending
    Between(K, K),
}

impl<K> Range<K> {
    /// Order in which keys are produced
    pub fn direction(&self) -> Direction {
        match self {
            Range::Last(_) | Range::LastBefore(..) | Range::LastBetween(..) => Direction::Reverse,
            _ => Direction::Forward,
        }
    }

    /// Maximum number of keys, if limited
    pub fn limit(&self) -> Option<usize> {
        match self {
            Range::First(n)
            | Range::FirstAfter(n, _)
            | Range::FirstBetween(n, _, _)
            | Range::Last(n)
            | Range::LastBefore(n, _)
            | Range::LastBetween(n, _, _) => Some(*n),
            Range::Unbounded | Range::Between(..) => None,
        }
    }

    /// Lower edge of the window
    pub fn lower_bound(&self) -> Bound<&K> {
        match self {
            Range::FirstAfter(_, c) => Bound::Excluded(c),
            Range::FirstBetween(_, lo, _) | Range::LastBetween(_, lo, _) => Bound::Excluded(lo),
            Range::Between(lo, _) => Bound::Included(lo),
            _ => Bound::Unbounded,
        }
    }

    /// Upper edge of the window
    pub fn upper_bound(&self) -> Bound<&K> {
        match self {
            Range::LastBefore(_, c) => Bound::Excluded(c),
            Range::FirstBetween(_, _, hi) | Range::LastBetween(_, _, hi) => Bound::Excluded(hi),
            Range::Between(_, hi) => Bound::Included(hi),
            _ => Bound::Unbounded,
        }
    }

    /// Convert the cursor keys to another domain
    pub fn map<U>(self, mut f: impl FnMut(K) -> U) -> Range<U> {
        match self {
            Range::Unbounded => Range::Unbounded,
            Range::First(n) => Range::First(n),
            Range::FirstAfter(n, c) => Range::FirstAfter(n, f(c)),
            Range::FirstBetween(n, lo, hi) => Range::FirstBetween(n, f(lo), f(hi)),
            Range::Last(n) => Range::Last(n),
            Range::LastBefore(n, c) => Range::LastBefore(n, f(c)),
            Range::LastBetween(n, lo, hi) => Range::LastBetween(n, f(lo), f(hi)),
            Range::Between(lo, hi) => Range::Between(f(lo), f(hi)),
        }
    }
}
