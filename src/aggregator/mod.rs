//! Time-bucketed UserOperation counters.
//!
//! Every recorded operation increments exactly one bucket in each of three
//! independent tables (hourly, daily, weekly). A bucket is keyed by the
//! operation outcome, whether the sender is a known bundler, and the label of
//! the period the event was *processed* in.
//!
//! Periods are taken from the wall clock at record time, not from the block
//! timestamp, so a burst of delayed events is counted in the period in which
//! the pipeline saw it.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use alloy::primitives::{Address, B256, U256};
//! use chrono::{TimeZone, Utc};
//! use erc4337_analytics::aggregator::{Aggregator, BucketKey, Granularity};
//! use erc4337_analytics::bundlers::BundlerSet;
//! use erc4337_analytics::events::UserOperation;
//!
//! let bundler = Address::repeat_byte(0xaa);
//! let aggregator = Aggregator::new(Arc::new(BundlerSet::new([bundler])));
//! let op = UserOperation {
//!     sender: bundler,
//!     success: true,
//!     op_hash: B256::ZERO,
//!     paymaster: Address::ZERO,
//!     nonce: U256::ZERO,
//!     actual_gas_cost: U256::ZERO,
//!     block_number: None,
//!     transaction_hash: None,
//! };
//!
//! let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
//! aggregator.record(&op, at);
//!
//! let key = BucketKey::new(true, true, "2024-01-15 10");
//! assert_eq!(aggregator.table(Granularity::Hour).get(&key), 1);
//! ```

mod period;
mod table;

pub use period::Granularity;
pub use table::{BucketKey, CounterEntry, CounterTable};

use crate::bundlers::BundlerSet;
use crate::events::UserOperation;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Owns the hourly, daily and weekly counter tables.
#[derive(Debug)]
pub struct Aggregator {
    bundlers: Arc<BundlerSet>,
    hourly: CounterTable,
    daily: CounterTable,
    weekly: CounterTable,
}

impl Aggregator {
    /// Create an aggregator classifying senders against `bundlers`.
    #[must_use]
    pub fn new(bundlers: Arc<BundlerSet>) -> Self {
        Self {
            bundlers,
            hourly: CounterTable::new(),
            daily: CounterTable::new(),
            weekly: CounterTable::new(),
        }
    }

    /// The bundler set used for classification.
    #[must_use]
    pub fn bundlers(&self) -> &BundlerSet {
        &self.bundlers
    }

    /// The table backing `granularity`.
    #[must_use]
    pub const fn table(&self, granularity: Granularity) -> &CounterTable {
        match granularity {
            Granularity::Hour => &self.hourly,
            Granularity::Day => &self.daily,
            Granularity::Week => &self.weekly,
        }
    }

    /// The three keys an operation observed at `observed_at` maps to, in
    /// [`Granularity::ALL`] order.
    #[must_use]
    pub fn bucket_keys(&self, op: &UserOperation, observed_at: DateTime<Utc>) -> [BucketKey; 3] {
        let bundler = self.bundlers.contains(op.sender);
        Granularity::ALL.map(|g| BucketKey::new(op.success, bundler, g.label(observed_at)))
    }

    /// Count one operation in every table.
    pub fn record(&self, op: &UserOperation, observed_at: DateTime<Utc>) {
        let keys = self.bucket_keys(op, observed_at);
        let bundler = keys[0].bundler;

        for (granularity, key) in Granularity::ALL.into_iter().zip(keys) {
            self.table(granularity)
                .increment(key, granularity.bounds(observed_at));
        }

        debug!(
            sender = %op.sender,
            success = op.success,
            bundler,
            op_hash = %op.op_hash,
            "Recorded user operation"
        );
    }

    /// Read-only copy of one table.
    #[must_use]
    pub fn snapshot(&self, granularity: Granularity) -> Vec<CounterEntry> {
        self.table(granularity).snapshot()
    }

    /// Drop buckets from every table whose period ended at or before `cutoff`.
    pub fn evict_expired(&self, cutoff: DateTime<Utc>) -> usize {
        let evicted: usize = Granularity::ALL
            .into_iter()
            .map(|g| self.table(g).evict_expired(cutoff))
            .sum();
        if evicted > 0 {
            info!(evicted, cutoff = %cutoff, "Evicted stale counter buckets");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Address, B256, U256};
    use chrono::TimeZone;

    const BUNDLER: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    const STRANGER: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");

    fn op(sender: Address, success: bool) -> UserOperation {
        UserOperation {
            sender,
            success,
            op_hash: B256::repeat_byte(1),
            paymaster: Address::ZERO,
            nonce: U256::ZERO,
            actual_gas_cost: U256::ZERO,
            block_number: None,
            transaction_hash: None,
        }
    }

    fn aggregator() -> Aggregator {
        Aggregator::new(Arc::new(BundlerSet::new([BUNDLER])))
    }

    fn at(h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, min, 0).unwrap()
    }

    #[test]
    fn test_keys_are_deterministic() {
        let agg = aggregator();
        let a = agg.bucket_keys(&op(BUNDLER, true), at(10, 5));
        let b = agg.bucket_keys(&op(BUNDLER, true), at(10, 5));
        assert_eq!(a, b);
        assert_eq!(a[0], BucketKey::new(true, true, "2024-01-15 10"));
        assert_eq!(a[1], BucketKey::new(true, true, "2024-01-15"));
        assert_eq!(a[2], BucketKey::new(true, true, "2024-W03"));
    }

    #[test]
    fn test_record_touches_each_table_once() {
        let agg = aggregator();
        agg.record(&op(BUNDLER, true), at(10, 30));

        for g in Granularity::ALL {
            let snapshot = agg.snapshot(g);
            assert_eq!(snapshot.len(), 1, "{g}");
            assert_eq!(snapshot[0].count, 1);
            assert!(snapshot[0].key.bundler);
            assert!(snapshot[0].key.success);
        }
    }

    #[test]
    fn test_unknown_failed_sender() {
        let agg = aggregator();
        agg.record(&op(STRANGER, false), at(10, 30));

        let day = agg.table(Granularity::Day);
        assert_eq!(day.get(&BucketKey::new(false, false, "2024-01-15")), 1);
        assert_eq!(day.get(&BucketKey::new(true, true, "2024-01-15")), 0);
        assert_eq!(day.get(&BucketKey::new(false, true, "2024-01-15")), 0);
    }

    #[test]
    fn test_hour_apart_splits_hourly_only() {
        let agg = aggregator();
        agg.record(&op(BUNDLER, true), at(10, 30));
        agg.record(&op(BUNDLER, true), at(11, 30));

        assert_eq!(agg.snapshot(Granularity::Hour).len(), 2);
        let daily = agg.snapshot(Granularity::Day);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].count, 2);
    }

    #[test]
    fn test_evict_expired_keeps_open_periods() {
        let agg = aggregator();
        agg.record(&op(BUNDLER, true), at(1, 0));
        agg.record(&op(BUNDLER, true), at(5, 0));

        // The day and week containing 05:00 are still open.
        assert_eq!(agg.evict_expired(at(5, 0)), 1);
        assert_eq!(agg.snapshot(Granularity::Hour).len(), 1);
        assert_eq!(agg.snapshot(Granularity::Day)[0].count, 2);
        assert_eq!(agg.snapshot(Granularity::Week)[0].count, 2);

        let next_day = Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap();
        assert_eq!(agg.evict_expired(next_day), 2);
        assert!(agg.snapshot(Granularity::Hour).is_empty());
        assert!(agg.snapshot(Granularity::Day).is_empty());
        assert_eq!(agg.snapshot(Granularity::Week).len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_record_same_bucket() {
        let agg = Arc::new(aggregator());
        let observed = at(10, 30);

        let tasks: Vec<_> = (0..200)
            .map(|_| {
                let agg = Arc::clone(&agg);
                tokio::spawn(async move { agg.record(&op(BUNDLER, true), observed) })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        for g in Granularity::ALL {
            let snapshot = agg.snapshot(g);
            assert_eq!(snapshot.len(), 1);
            assert_eq!(snapshot[0].count, 200);
        }
    }
}
