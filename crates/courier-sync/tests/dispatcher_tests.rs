// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operation log draining: ordering, acknowledgment and retry.

use std::sync::Arc;
use std::time::Duration;

use courier_config::model::DispatcherConfig;
use courier_core::{ConversationId, MergedIndex, OperationTag, PeerNamespace, StorageIndex};
use courier_sync::{DrainReport, OperationDispatcher};
use courier_test_utils::{MockDelivery, TestHarness};
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

const TAG: OperationTag = OperationTag::CloudChatRemoveMessages;
const A: ConversationId = ConversationId::new(PeerNamespace::CloudUser, 1);
const B: ConversationId = ConversationId::new(PeerNamespace::CloudGroup, 2);

fn config() -> DispatcherConfig {
    DispatcherConfig {
        poll_interval_secs: 1,
        initial_backoff_ms: 20,
        max_backoff_ms: 40,
    }
}

async fn enqueue(harness: &TestHarness, entries: Vec<(ConversationId, &'static str)>) {
    harness
        .db
        .transaction(move |txn| {
            for (peer, contents) in entries {
                txn.operation_log_add_entry(
                    peer,
                    TAG,
                    StorageIndex::Automatic,
                    MergedIndex::Automatic,
                    contents.as_bytes().to_vec(),
                )?;
            }
            Ok(())
        })
        .await
        .unwrap();
}

fn contents_of(entries: &[courier_core::OperationLogEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| String::from_utf8(entry.contents.clone()).unwrap())
        .collect()
}

#[tokio::test]
async fn drains_in_per_peer_order_and_removes_acknowledged() {
    let harness = TestHarness::new().await.unwrap();
    enqueue(&harness, vec![(A, "a1"), (B, "b1"), (A, "a2"), (B, "b2"), (A, "a3")]).await;

    let delivery = Arc::new(MockDelivery::new());
    let mut dispatcher = OperationDispatcher::new(harness.db.clone(), delivery.clone(), TAG, config());
    let report = dispatcher.drain_once().await.unwrap();
    assert_eq!(
        report,
        DrainReport {
            delivered: 5,
            failed: 0,
            deferred: 0
        }
    );

    let delivered = contents_of(&delivery.delivered().await);
    assert_eq!(delivered, vec!["a1", "a2", "a3", "b1", "b2"]);
    let remaining = harness
        .db
        .transaction(|txn| txn.operation_log_count(TAG))
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn failure_holds_back_peer_until_backoff_expires() {
    let harness = TestHarness::new().await.unwrap();
    enqueue(&harness, vec![(A, "a1"), (A, "a2")]).await;

    let delivery = Arc::new(MockDelivery::new());
    delivery.fail_next(1).await;
    let mut dispatcher = OperationDispatcher::new(harness.db.clone(), delivery.clone(), TAG, config());

    let first = dispatcher.drain_once().await.unwrap();
    assert_eq!(first.failed, 1);
    assert_eq!(first.delivered, 0);
    assert_eq!(delivery.attempt_count().await, 1);

    let during_backoff = dispatcher.drain_once().await.unwrap();
    assert_eq!(during_backoff.deferred, 1);
    assert_eq!(delivery.attempt_count().await, 1);

    tokio::time::sleep(Duration::from_millis(60)).await;
    let retried = dispatcher.drain_once().await.unwrap();
    assert_eq!(retried.delivered, 2);
    assert_eq!(contents_of(&delivery.delivered().await), vec!["a1", "a2"]);
}

#[tokio::test]
#[traced_test]
async fn failing_peer_does_not_block_others() {
    let harness = TestHarness::new().await.unwrap();
    enqueue(&harness, vec![(A, "a1"), (B, "b1")]).await;

    let delivery = Arc::new(MockDelivery::new());
    delivery.fail_next(1).await;
    let mut dispatcher = OperationDispatcher::new(harness.db.clone(), delivery.clone(), TAG, config());

    let report = dispatcher.drain_once().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(contents_of(&delivery.delivered().await), vec!["b1"]);
    assert!(logs_contain("operation delivery failed"));
}

#[tokio::test]
async fn run_delivers_until_cancelled() {
    let harness = TestHarness::new().await.unwrap();
    enqueue(&harness, vec![(A, "a1")]).await;

    let delivery = Arc::new(MockDelivery::new());
    let dispatcher = OperationDispatcher::new(harness.db.clone(), delivery.clone(), TAG, config());
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(dispatcher.run(cancel.clone()));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while delivery.delivered().await.is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "entry was never delivered");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    cancel.cancel();
    handle.await.unwrap();
}
