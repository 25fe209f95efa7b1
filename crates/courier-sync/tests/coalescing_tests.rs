// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coalescing of account-wide reconciliation operations.

use courier_core::{
    ChatListGroupId, CollectionId, CollectionInfo, CollectionItem, CollectionNamespace,
    ConversationId, MessageNamespace, OperationTag, PeerNamespace, PinnedItemId,
};
use courier_sync::contents::{
    CloudChatRemoveMessagesOperation, DeletionType, SynchronizeInstalledCollectionsOperation,
    SynchronizePinnedChatsOperation,
};
use courier_sync::synchronize::{installed_collections_peer, pinned_chats_peer};
use courier_sync::{
    add_collection_interactively, add_synchronize_pinned_chats_operation,
    clear_history_interactively, delete_messages_interactively, remove_collection_interactively,
    set_pinned_chats_interactively, RemoveCollectionOption,
};
use courier_test_utils::{MessageBuilder, TestHarness};
use proptest::prelude::*;

const GROUP: ChatListGroupId = ChatListGroupId(0);

fn pinned(ids: &[i64]) -> Vec<PinnedItemId> {
    ids.iter()
        .map(|id| PinnedItemId::Peer {
            peer: ConversationId::new(PeerNamespace::CloudUser, *id),
        })
        .collect()
}

fn sticker(id: i64) -> CollectionInfo {
    CollectionInfo {
        id: CollectionId {
            namespace: CollectionNamespace::Stickers,
            id,
        },
        access_hash: id * 10,
        title: format!("Pack {id}"),
        short_name: format!("pack_{id}"),
        hash: 1,
        count: 1,
    }
}

fn items() -> Vec<CollectionItem> {
    vec![CollectionItem {
        index: 0,
        file_id: 1,
        alt: "x".into(),
    }]
}

#[tokio::test]
async fn pinned_sync_keeps_first_baseline() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .db
        .transaction(|txn| txn.set_pinned_item_ids(GROUP, &pinned(&[1, 2])))
        .await
        .unwrap();

    for next in [vec![2, 1], vec![3], vec![3, 4]] {
        harness
            .db
            .transaction(move |txn| set_pinned_chats_interactively(txn, GROUP, &pinned(&next)))
            .await
            .unwrap();
    }

    let (entries, current) = harness
        .db
        .transaction(|txn| {
            Ok((
                txn.operation_log_entries(pinned_chats_peer(GROUP), OperationTag::SynchronizePinnedChats)?,
                txn.get_pinned_item_ids(GROUP)?,
            ))
        })
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    let operation: SynchronizePinnedChatsOperation = entries[0].decode().unwrap();
    assert_eq!(operation.previous_item_ids, pinned(&[1, 2]));
    assert_eq!(current, pinned(&[3, 4]));
}

#[tokio::test]
async fn installed_collections_accumulate_archive() {
    let harness = TestHarness::new().await.unwrap();
    let peer = installed_collections_peer(CollectionNamespace::Stickers);
    harness
        .db
        .transaction(|txn| {
            add_collection_interactively(txn, sticker(1), items())?;
            add_collection_interactively(txn, sticker(2), items())?;
            Ok(())
        })
        .await
        .unwrap();

    // The acknowledged baseline: drop what the two installs queued.
    harness
        .db
        .transaction(move |txn| {
            for entry in txn.operation_log_entries(peer, OperationTag::SynchronizeInstalledCollections)? {
                txn.operation_log_remove_entry(peer, entry.tag, entry.tag_local_index)?;
            }
            Ok(())
        })
        .await
        .unwrap();

    let (entries, installed) = harness
        .db
        .transaction(move |txn| {
            remove_collection_interactively(txn, sticker(1).id, RemoveCollectionOption::Archive)?;
            add_collection_interactively(txn, sticker(3), items())?;
            remove_collection_interactively(txn, sticker(3).id, RemoveCollectionOption::Delete)?;
            Ok((
                txn.operation_log_entries(peer, OperationTag::SynchronizeInstalledCollections)?,
                txn.get_item_collection_infos(CollectionNamespace::Stickers)?,
            ))
        })
        .await
        .unwrap();

    assert_eq!(entries.len(), 1);
    let operation: SynchronizeInstalledCollectionsOperation = entries[0].decode().unwrap();
    assert_eq!(operation.previous_collections, vec![sticker(2).id, sticker(1).id]);
    assert_eq!(operation.archived_collections, vec![sticker(1).id]);
    let installed: Vec<i64> = installed.iter().map(|info| info.id.id).collect();
    assert_eq!(installed, vec![2]);
}

#[tokio::test]
async fn reinstalling_moves_collection_to_front() {
    let harness = TestHarness::new().await.unwrap();
    let order = harness
        .db
        .transaction(|txn| {
            add_collection_interactively(txn, sticker(1), items())?;
            add_collection_interactively(txn, sticker(2), items())?;
            add_collection_interactively(txn, sticker(1), items())?;
            Ok(txn
                .get_item_collection_infos(CollectionNamespace::Stickers)?
                .iter()
                .map(|info| info.id.id)
                .collect::<Vec<_>>())
        })
        .await
        .unwrap();
    assert_eq!(order, vec![1, 2]);
}

#[tokio::test]
async fn cloud_deletions_queue_per_conversation() {
    let harness = TestHarness::new().await.unwrap();
    let a = ConversationId::new(PeerNamespace::CloudUser, 1);
    let b = ConversationId::new(PeerNamespace::CloudChannel, 2);
    let messages = vec![
        MessageBuilder::new(a, MessageNamespace::Cloud, 10).build(),
        MessageBuilder::new(a, MessageNamespace::Cloud, 11).build(),
        MessageBuilder::new(b, MessageNamespace::Cloud, 20).build(),
    ];
    let ids: Vec<_> = messages.iter().map(|message| message.id).collect();
    harness.store_messages(messages).await.unwrap();

    let (a_entries, b_entries) = harness
        .db
        .transaction(move |txn| {
            delete_messages_interactively(txn, &ids[..2], DeletionType::ForEveryone)?;
            clear_history_interactively(txn, b, DeletionType::ForLocalPeer, 0)?;
            Ok((
                txn.operation_log_entries(a, OperationTag::CloudChatRemoveMessages)?,
                txn.operation_log_entries(b, OperationTag::CloudChatRemoveMessages)?,
            ))
        })
        .await
        .unwrap();

    assert_eq!(
        a_entries[0].decode::<CloudChatRemoveMessagesOperation>().unwrap(),
        CloudChatRemoveMessagesOperation::RemoveMessages {
            message_ids: vec![10, 11],
            deletion: DeletionType::ForEveryone,
        }
    );
    assert_eq!(
        b_entries[0].decode::<CloudChatRemoveMessagesOperation>().unwrap(),
        CloudChatRemoveMessagesOperation::ClearHistory {
            top_message_id: 20,
            deletion: DeletionType::ForLocalPeer,
        }
    );
    assert!(a_entries[0].merged_index < b_entries[0].merged_index);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// However many pinned syncs are requested, one stays pending and it
    /// carries the list from before the first request.
    #[test]
    fn pinned_sync_coalesces_any_sequence(lists in prop::collection::vec(prop::collection::vec(1i64..20, 0..5), 1..8)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let harness = TestHarness::new().await.unwrap();
            harness.db.transaction(|txn| txn.set_pinned_item_ids(GROUP, &pinned(&[99]))).await.unwrap();

            for list in lists {
                harness
                    .db
                    .transaction(move |txn| {
                        add_synchronize_pinned_chats_operation(txn, GROUP)?;
                        txn.set_pinned_item_ids(GROUP, &pinned(&list))
                    })
                    .await
                    .unwrap();
            }

            let entries = harness
                .db
                .transaction(|txn| txn.operation_log_entries(pinned_chats_peer(GROUP), OperationTag::SynchronizePinnedChats))
                .await
                .unwrap();
            assert_eq!(entries.len(), 1);
            let operation: SynchronizePinnedChatsOperation = entries[0].decode().unwrap();
            assert_eq!(operation.previous_item_ids, pinned(&[99]));
        });
    }
}
