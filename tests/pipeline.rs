//! End-to-end pipeline tests: logs in, counters and exposition out.
//!
//! A scripted in-memory log source stands in for the node so the whole
//! decode, classify and aggregate path runs without network access.

use alloy::primitives::{address, Address, Bytes, Log as PrimitiveLog, LogData, B256, U256};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use chrono::{TimeZone, Utc};
use erc4337_analytics::aggregator::{Aggregator, BucketKey, Granularity};
use erc4337_analytics::bundlers::BundlerSet;
use erc4337_analytics::error::{TrackerError, TrackerResult};
use erc4337_analytics::events::{EntryPointDecoder, UserOperationEvent, ENTRY_POINT_V06};
use erc4337_analytics::rpc::Backoff;
use erc4337_analytics::subscriber::{
    process_log, LogSource, LogStream, Subscriber, SubscriberHealth, SubscriberSettings,
};
use futures_util::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const BUNDLER: Address = address!("000000000000000000000000000000000000aaaa");
const STRANGER: Address = address!("000000000000000000000000000000000000bbbb");

struct ScriptedSource {
    streams: VecDeque<LogStream>,
}

impl LogSource for ScriptedSource {
    async fn subscribe(&mut self, _filter: Filter) -> TrackerResult<LogStream> {
        self.streams
            .pop_front()
            .ok_or_else(|| TrackerError::websocket_subscription("script exhausted", None))
    }

    async fn reconnect(&mut self) -> TrackerResult<()> {
        Ok(())
    }
}

fn user_operation_log(sender: Address, success: bool) -> Log {
    let event = UserOperationEvent {
        userOpHash: B256::repeat_byte(0x42),
        sender,
        paymaster: Address::ZERO,
        nonce: U256::from(1),
        success,
        actualGasCost: U256::from(50_000),
        actualGasUsed: U256::from(80_000),
    };
    Log {
        inner: PrimitiveLog {
            address: ENTRY_POINT_V06,
            data: event.encode_log_data(),
        },
        block_number: Some(19_500_000),
        ..Default::default()
    }
}

fn unknown_event_log() -> Log {
    Log {
        inner: PrimitiveLog {
            address: ENTRY_POINT_V06,
            data: LogData::new_unchecked(vec![B256::repeat_byte(0xee)], Bytes::new()),
        },
        ..Default::default()
    }
}

fn aggregator() -> Arc<Aggregator> {
    Arc::new(Aggregator::new(Arc::new(BundlerSet::new([BUNDLER]))))
}

fn total(aggregator: &Aggregator, granularity: Granularity) -> u64 {
    aggregator.snapshot(granularity).iter().map(|e| e.count).sum()
}

#[test]
fn test_bundler_success_lands_in_every_table() {
    let aggregator = aggregator();
    let decoder = EntryPointDecoder::new(ENTRY_POINT_V06);
    let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();

    let op = process_log(&decoder, &aggregator, &user_operation_log(BUNDLER, true), at);
    assert_eq!(op.map(|o| o.sender), Some(BUNDLER));

    let hourly = aggregator.table(Granularity::Hour);
    let daily = aggregator.table(Granularity::Day);
    let weekly = aggregator.table(Granularity::Week);
    assert_eq!(hourly.get(&BucketKey::new(true, true, "2024-01-15 10")), 1);
    assert_eq!(daily.get(&BucketKey::new(true, true, "2024-01-15")), 1);
    assert_eq!(weekly.get(&BucketKey::new(true, true, "2024-W03")), 1);
}

#[test]
fn test_unknown_sender_failure_leaves_bundler_buckets_alone() {
    let aggregator = aggregator();
    let decoder = EntryPointDecoder::new(ENTRY_POINT_V06);
    let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();

    process_log(&decoder, &aggregator, &user_operation_log(BUNDLER, true), at);
    process_log(&decoder, &aggregator, &user_operation_log(STRANGER, false), at);

    let hourly = aggregator.table(Granularity::Hour);
    assert_eq!(hourly.get(&BucketKey::new(false, false, "2024-01-15 10")), 1);
    assert_eq!(hourly.get(&BucketKey::new(true, true, "2024-01-15 10")), 1);
    assert_eq!(hourly.get(&BucketKey::new(false, true, "2024-01-15 10")), 0);
}

#[test]
fn test_unrecognized_signature_changes_nothing() {
    let aggregator = aggregator();
    let decoder = EntryPointDecoder::new(ENTRY_POINT_V06);

    assert!(process_log(&decoder, &aggregator, &unknown_event_log(), Utc::now()).is_none());
    for granularity in Granularity::ALL {
        assert!(aggregator.snapshot(granularity).is_empty());
    }
}

#[test]
fn test_bundler_file_trailing_blank_line() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{BUNDLER}").unwrap();
    writeln!(file).unwrap();

    let bundlers = BundlerSet::from_file(file.path()).unwrap();
    assert_eq!(bundlers.len(), 1);
    assert!(bundlers.contains(BUNDLER));
    assert!(!bundlers.contains_str(""));
    assert!(!bundlers.contains(Address::ZERO));
}

#[tokio::test]
async fn test_subscriber_drives_aggregator() {
    let items = vec![
        Ok(user_operation_log(BUNDLER, true)),
        Ok(user_operation_log(STRANGER, true)),
        Err(TrackerError::websocket_subscription("lagged", None)),
        Ok(unknown_event_log()),
        Ok(user_operation_log(STRANGER, false)),
    ];
    let source = ScriptedSource {
        streams: VecDeque::from([stream::iter(items).chain(stream::pending()).boxed()]),
    };

    let aggregator = aggregator();
    let health = Arc::new(SubscriberHealth::new(5));
    let mut subscriber = Subscriber::new(
        source,
        EntryPointDecoder::new(ENTRY_POINT_V06),
        Arc::clone(&aggregator),
        Arc::clone(&health),
        SubscriberSettings {
            idle_timeout: Duration::from_millis(100),
            max_workers: 2,
            backoff: Backoff::with_settings(1, Duration::from_millis(1), Duration::from_millis(1)),
        },
    );

    let stream = subscriber.connect().await.unwrap();
    let handle = tokio::spawn(subscriber.run(stream));

    tokio::time::timeout(Duration::from_secs(5), async {
        while total(&aggregator, Granularity::Day) < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    for granularity in Granularity::ALL {
        assert_eq!(total(&aggregator, granularity), 3, "{granularity}");
    }
    let bundler_ops: u64 = aggregator
        .snapshot(Granularity::Week)
        .iter()
        .filter(|e| e.key.bundler)
        .map(|e| e.count)
        .sum();
    assert_eq!(bundler_ops, 1);
    assert!(health.is_healthy());

    handle.abort();
}

#[tokio::test]
async fn test_subscriber_gives_up_when_node_is_gone() {
    let source = ScriptedSource {
        streams: VecDeque::from([
            stream::iter(vec![Ok(user_operation_log(BUNDLER, true))]).boxed(),
        ]),
    };

    let aggregator = aggregator();
    let health = Arc::new(SubscriberHealth::new(5));
    let mut subscriber = Subscriber::new(
        source,
        EntryPointDecoder::new(ENTRY_POINT_V06),
        Arc::clone(&aggregator),
        Arc::clone(&health),
        SubscriberSettings {
            idle_timeout: Duration::from_secs(1),
            max_workers: 1,
            backoff: Backoff::with_settings(2, Duration::from_millis(1), Duration::from_millis(2)),
        },
    );

    let stream = subscriber.connect().await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), subscriber.run(stream))
        .await
        .unwrap();

    assert!(matches!(
        result,
        Err(TrackerError::MaxReconnectAttemptsExceeded { attempts: 2, .. })
    ));
    assert!(!health.is_healthy());
}
