//! Per-crawl deduplication sets.

use std::collections::HashSet;
use std::hash::Hash;

use chrono::{DateTime, FixedOffset};

use crate::domain::StopId;

const MINUTE_MS: i64 = 60_000;

/// A set of keys that only grows.
#[derive(Debug)]
pub struct VisitedSet<K> {
    seen: HashSet<K>,
}

impl<K: Eq + Hash> VisitedSet<K> {
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    pub fn seen(&self, key: &K) -> bool {
        self.seen.contains(key)
    }

    pub fn mark_seen(&mut self, key: K) {
        self.seen.insert(key);
    }

    /// Check and mark in one step. Returns `true` if the key was new.
    pub fn insert(&mut self, key: K) -> bool {
        self.seen.insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl<K: Eq + Hash> Default for VisitedSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of a fallback journey query: origin, target and the minute it
/// departs in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JourneySignature {
    pub origin: StopId,
    pub target: StopId,
    pub bucket: i64,
}

impl JourneySignature {
    pub fn new(origin: StopId, target: StopId, when: DateTime<FixedOffset>) -> Self {
        Self {
            origin,
            target,
            bucket: minute_bucket(when),
        }
    }
}

/// Identity of an edge: canonical endpoints, duration and line name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeSignature {
    pub source: StopId,
    pub target: StopId,
    pub duration_ms: i64,
    pub line: String,
}

/// Minutes since the epoch, rounded half up.
pub fn minute_bucket(when: DateTime<FixedOffset>) -> i64 {
    (when.timestamp_millis() + MINUTE_MS / 2).div_euclid(MINUTE_MS)
}

/// The four visited sets of one crawl.
#[derive(Debug, Default)]
pub struct VisitedSets {
    /// Stops and stations by canonical id.
    pub stops: VisitedSet<StopId>,
    /// Trips by provider id.
    pub trips: VisitedSet<String>,
    /// Fallback journey queries.
    pub journeys: VisitedSet<JourneySignature>,
    /// Emitted edges.
    pub edges: VisitedSet<EdgeSignature>,
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// However often keys repeat, each is reported new exactly once
        #[test]
        fn each_key_new_once(keys in proptest::collection::vec("[a-e]{1,2}", 0..64)) {
            let mut set = VisitedSet::new();
            let mut novel = 0;
            for key in &keys {
                if set.insert(key.clone()) {
                    novel += 1;
                }
            }
            let distinct: HashSet<_> = keys.iter().collect();
            prop_assert_eq!(novel, distinct.len());
            prop_assert_eq!(set.len(), distinct.len());
        }

        /// Instants within the same half-open minute share a bucket
        #[test]
        fn bucket_is_nearest_minute(secs in 0i64..10_000_000, offset_ms in 0i64..60_000) {
            let minute_start = secs * 60_000;
            let when = DateTime::from_timestamp_millis(minute_start + offset_ms)
                .unwrap()
                .fixed_offset();
            let expected = if offset_ms < 30_000 { secs } else { secs + 1 };
            prop_assert_eq!(minute_bucket(when), expected);
        }
    }
}
