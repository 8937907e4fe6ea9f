//! Microsecond-precision version timestamp
//!
//! Every document version is stamped with a [`Timestamp`]. Version history is
//! ordered chronologically by it, and "as of" reads pick the latest version at
//! or before a given one.
//!
//! ## Precision and range
//!
//! Timestamps are stored as signed microseconds since Unix epoch
//! (1970-01-01 00:00:00 UTC). Negative values are valid: documents may be
//! versioned at historical dates such as 1624-01-01.
//!
//! ## Usage
//!
//! ```
//! use chronodoc_core::Timestamp;
//!
//! let ts = Timestamp::parse("2018-10-07T19:49:26.307Z").unwrap();
//! let same = Timestamp::from_ymd_hms_milli(2018, 10, 7, 19, 49, 26, 307).unwrap();
//! assert_eq!(ts, same);
//! ```

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Microsecond-precision timestamp
///
/// ## Invariants
///
/// - Timestamps are always in microseconds
/// - Timestamps are comparable and orderable
/// - [`to_sortable_bytes`](Timestamp::to_sortable_bytes) preserves ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Unix epoch (1970-01-01 00:00:00 UTC)
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Earliest representable timestamp
    pub const MIN: Timestamp = Timestamp(i64::MIN);

    /// Latest representable timestamp, used for "effectively latest" reads
    pub const MAX: Timestamp = Timestamp(i64::MAX);

    /// Encoded width in bytes
    pub const ENCODED_LEN: usize = 8;

    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a timestamp for the current moment
    pub fn now() -> Self {
        Timestamp::from_datetime(Utc::now())
    }

    /// Create a timestamp from microseconds since epoch
    #[inline]
    pub const fn from_micros(micros: i64) -> Self {
        Timestamp(micros)
    }

    /// Create a timestamp from milliseconds since epoch
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Timestamp(millis.saturating_mul(1_000))
    }

    /// Create a timestamp from a chrono UTC datetime (sub-microsecond precision is dropped)
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let micros = dt
            .timestamp()
            .saturating_mul(1_000_000)
            .saturating_add(i64::from(dt.timestamp_subsec_micros()));
        Timestamp(micros)
    }

    /// Create a timestamp from calendar fields in UTC
    ///
    /// Returns `None` for impossible dates.
    pub fn from_ymd_hms_milli(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        milli: u32,
    ) -> Option<Self> {
        let naive = NaiveDate::from_ymd_opt(year, month, day)?
            .and_hms_milli_opt(hour, minute, second, milli)?;
        Some(Timestamp::from_datetime(Utc.from_utc_datetime(&naive)))
    }

    /// Parse an RFC 3339 timestamp (any offset, normalized to UTC)
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)?;
        Ok(Timestamp::from_datetime(dt.with_timezone(&Utc)))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get microseconds since Unix epoch
    #[inline]
    pub const fn as_micros(&self) -> i64 {
        self.0
    }

    /// Convert to a chrono UTC datetime
    ///
    /// Returns `None` outside chrono's representable range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let secs = self.0.div_euclid(1_000_000);
        let nanos = (self.0.rem_euclid(1_000_000) * 1_000) as u32;
        Utc.timestamp_opt(secs, nanos).single()
    }

    /// The next representable timestamp (one microsecond later, saturating)
    pub fn next(&self) -> Self {
        Timestamp(self.0.saturating_add(1))
    }

    // =========================================================================
    // Order-preserving encoding
    // =========================================================================

    /// Encode to 8 big-endian bytes with the sign bit flipped
    ///
    /// Byte-lexicographic order of the output equals chronological order.
    pub fn to_sortable_bytes(&self) -> [u8; 8] {
        ((self.0 as u64) ^ (1u64 << 63)).to_be_bytes()
    }

    /// Decode bytes produced by [`to_sortable_bytes`](Timestamp::to_sortable_bytes)
    pub fn from_sortable_bytes(bytes: [u8; 8]) -> Self {
        Timestamp((u64::from_be_bytes(bytes) ^ (1u64 << 63)) as i64)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Timestamp::from_datetime(dt)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.6fZ")),
            None => write!(f, "{}us", self.0),
        }
    }
}
