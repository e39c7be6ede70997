//! A single granularity's counter table.
//!
//! Existing buckets are bumped with one atomic `fetch_add` under the read
//! lock. Only the first event of a new period takes the write lock, and the
//! `entry` API there guarantees a single creator.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter key: outcome, sender classification and period label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BucketKey {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Whether the sender is a known bundler.
    pub bundler: bool,
    /// Period label, see [`Granularity::label`](super::Granularity::label).
    pub period: String,
}

impl BucketKey {
    /// Create a key.
    #[must_use]
    pub fn new(success: bool, bundler: bool, period: impl Into<String>) -> Self {
        Self {
            success,
            bundler,
            period: period.into(),
        }
    }
}

/// One exported row of a [`CounterTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterEntry {
    /// Bucket identity.
    #[serde(flatten)]
    pub key: BucketKey,
    /// Start of the bucket's period.
    pub period_start: DateTime<Utc>,
    /// End (exclusive) of the bucket's period.
    pub period_end: DateTime<Utc>,
    /// Events recorded in the bucket.
    pub count: u64,
}

#[derive(Debug)]
struct Bucket {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    count: AtomicU64,
}

/// Monotonic counters for one granularity.
#[derive(Debug, Default)]
pub struct CounterTable {
    buckets: RwLock<HashMap<BucketKey, Bucket>>,
}

impl CounterTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one to `key`, creating the bucket at 1 if it does not exist.
    /// Returns the new count.
    pub fn increment(&self, key: BucketKey, period: (DateTime<Utc>, DateTime<Utc>)) -> u64 {
        {
            let buckets = self.buckets.read();
            if let Some(bucket) = buckets.get(&key) {
                return bucket.count.fetch_add(1, Ordering::Relaxed) + 1;
            }
        }

        let mut buckets = self.buckets.write();
        let bucket = buckets.entry(key).or_insert_with(|| Bucket {
            start: period.0,
            end: period.1,
            count: AtomicU64::new(0),
        });
        bucket.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current value of `key`, zero if absent.
    #[must_use]
    pub fn get(&self, key: &BucketKey) -> u64 {
        self.buckets
            .read()
            .get(key)
            .map_or(0, |b| b.count.load(Ordering::Relaxed))
    }

    /// Copy of every bucket, sorted by key: success, then bundler, then period label.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CounterEntry> {
        let mut entries: Vec<CounterEntry> = self
            .buckets
            .read()
            .iter()
            .map(|(key, bucket)| CounterEntry {
                key: key.clone(),
                period_start: bucket.start,
                period_end: bucket.end,
                count: bucket.count.load(Ordering::Relaxed),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// Drop buckets whose period ended at or before `cutoff`. Returns how many were removed.
    pub fn evict_expired(&self, cutoff: DateTime<Utc>) -> usize {
        let mut buckets = self.buckets.write();
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.end > cutoff);
        before - buckets.len()
    }

    /// Number of buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.read().len()
    }

    /// Whether the table has no buckets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.read().is_empty()
    }
}
