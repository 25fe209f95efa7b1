// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the durable store.

use courier_core::{
    ConversationId, CourierError, MergedIndex, OperationTag, PeerNamespace, StorageIndex,
};
use courier_storage::Database;
use tempfile::tempdir;

const PEER: ConversationId = ConversationId::new(PeerNamespace::CloudChannel, 77);
const TAG: OperationTag = OperationTag::CloudChatRemoveMessages;

/// Committed entries survive a reopen; rolled-back ones never appear.
#[tokio::test]
async fn committed_state_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("courier.db");
    let path = path.to_str().unwrap().to_string();

    let db = Database::open(&path).await.unwrap();
    db.transaction(|txn| {
        txn.operation_log_add_entry(PEER, TAG, StorageIndex::Automatic, MergedIndex::Automatic, b"kept".to_vec())?;
        Ok(())
    })
    .await
    .unwrap();
    let aborted: Result<(), CourierError> = db
        .transaction(|txn| {
            txn.operation_log_add_entry(PEER, TAG, StorageIndex::Automatic, MergedIndex::Automatic, b"lost".to_vec())?;
            Err(CourierError::Internal("simulated failure".into()))
        })
        .await;
    assert!(aborted.is_err());
    db.close().await.unwrap();

    let db = Database::open(&path).await.unwrap();
    let (entries, next) = db
        .transaction(|txn| {
            Ok((
                txn.operation_log_entries(PEER, TAG)?,
                txn.operation_log_next_local_index(PEER, TAG)?,
            ))
        })
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].contents, b"kept".to_vec());
    // The rolled-back allocation did not consume an index either.
    assert_eq!(next, 1);
}

/// Concurrent read-modify-write transactions never lose an update.
#[tokio::test]
async fn concurrent_transactions_are_serialized() {
    let db = Database::open_in_memory().await.unwrap();

    let mut handles = Vec::new();
    for n in 0..16u8 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            db.transaction(move |txn| {
                txn.operation_log_add_entry(PEER, TAG, StorageIndex::Automatic, MergedIndex::None, vec![n])
            })
            .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let indices = db
        .transaction(|txn| {
            Ok(txn
                .operation_log_entries(PEER, TAG)?
                .into_iter()
                .map(|entry| entry.tag_local_index)
                .collect::<Vec<_>>())
        })
        .await
        .unwrap();
    assert_eq!(indices, (0..16).collect::<Vec<_>>());
}
