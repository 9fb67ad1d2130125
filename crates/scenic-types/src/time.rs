//! Query scoping primitives: time windows and location sets.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parse a timestamp as `yyyy-mm-dd hh:mm:ss`, `yyyy-mm-dd hh:mm` or
/// RFC 3339, in that order.  This is the lenient format used on the oracle
/// wire and in QA datasets.
pub fn parse_flexible_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

// ─────────────────────────────────────────────────────────────────────────────
// TimeWindow
// ─────────────────────────────────────────────────────────────────────────────

/// A half-open-by-default time window; either bound may be absent, meaning
/// unbounded on that side.  The default window is fully unbounded, so a
/// query that mentions no time range scopes over the entire graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// The window covering all of time.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A window bounded on both sides.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// A window open towards the future.
    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// A window open towards the past.
    pub fn until(end: DateTime<Utc>) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    /// `true` when neither bound is set.
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// `true` when both bounds are present and inverted.  Such a window is
    /// malformed and must be rejected before filtering.
    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s > e)
    }

    /// Whether an instant falls inside the window (bounds inclusive).
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| t >= s) && self.end.is_none_or(|e| t <= e)
    }

    /// Whether the extent `[start, end]` overlaps this window.  An absent
    /// extent end is treated as an instantaneous extent at `start`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> bool {
        let extent_end = end.unwrap_or(start);
        self.start.is_none_or(|s| extent_end >= s) && self.end.is_none_or(|e| start <= e)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LocationSet
// ─────────────────────────────────────────────────────────────────────────────

/// The set of location tags a query is restricted to.  [`LocationSet::All`]
/// is the "no restriction" sentinel used when a query mentions no location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSet {
    All,
    Only(BTreeSet<String>),
}

impl LocationSet {
    /// Build a restricted set from any collection of tags.  An empty
    /// collection means "no restriction", mirroring an oracle that extracts
    /// no location from the query.
    pub fn only<I, S>(locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = locations.into_iter().map(Into::into).collect();
        if set.is_empty() { LocationSet::All } else { LocationSet::Only(set) }
    }

    /// Whether a location tag passes this filter.
    pub fn matches(&self, location: &str) -> bool {
        match self {
            LocationSet::All => true,
            LocationSet::Only(set) => set.contains(location),
        }
    }
}

impl Default for LocationSet {
    fn default() -> Self {
        LocationSet::All
    }
}
