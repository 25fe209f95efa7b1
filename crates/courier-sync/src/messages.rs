// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User-initiated message actions: immediate local effect plus a queued
//! operation for the server.

use std::collections::BTreeMap;

use courier_core::{
    ConversationId, CourierError, MergedIndex, MessageId, MessageNamespace, OperationTag,
    StorageIndex,
};
use courier_storage::Transaction;
use tracing::debug;

use crate::contents::{
    encode, CloudChatRemoveMessagesOperation, DeletionType, SecretChatOutgoingOperation,
};
use crate::secret_chat::{add_secret_chat_outgoing_operation, secret_chat_state, EnqueueOutcome};

/// Delete messages locally and queue the matching remote deletions, one
/// operation per conversation.
pub fn delete_messages_interactively(
    txn: &Transaction<'_>,
    ids: &[MessageId],
    deletion: DeletionType,
) -> Result<(), CourierError> {
    let mut by_peer: BTreeMap<ConversationId, Vec<MessageId>> = BTreeMap::new();
    for id in ids {
        by_peer.entry(id.peer).or_default().push(*id);
    }

    for (peer, peer_ids) in &by_peer {
        if peer.namespace.is_cloud() {
            let operation = CloudChatRemoveMessagesOperation::RemoveMessages {
                message_ids: peer_ids.iter().map(|id| id.id).collect(),
                deletion,
            };
            add_cloud_chat_remove_messages_operation(txn, *peer, &operation)?;
        } else if peer.is_secret_chat() {
            let mut globally_unique_ids = Vec::with_capacity(peer_ids.len());
            for id in peer_ids {
                if let Some(guid) = txn.get_message(*id)?.and_then(|m| m.globally_unique_id) {
                    globally_unique_ids.push(guid);
                }
            }
            add_secret_chat_outgoing_operation(txn, *peer, |layer| {
                Ok(SecretChatOutgoingOperation::DeleteMessages {
                    layer,
                    action_globally_unique_id: rand::random(),
                    globally_unique_ids,
                })
            })?;
        }
    }

    let removed = txn.delete_messages(ids)?;
    debug!(requested = ids.len(), removed, "messages deleted interactively");
    Ok(())
}

/// Clear a conversation's history locally and queue the remote clear.
///
/// For secret sessions, pending clears that the server has not acknowledged
/// are folded into the new one, which keeps the earliest baseline timestamp.
pub fn clear_history_interactively(
    txn: &Transaction<'_>,
    peer: ConversationId,
    deletion: DeletionType,
    now: i32,
) -> Result<(), CourierError> {
    if peer.namespace.is_cloud() {
        if let Some(top) = txn.top_message_index(peer, MessageNamespace::Cloud)? {
            let operation = CloudChatRemoveMessagesOperation::ClearHistory {
                top_message_id: top.id.id,
                deletion,
            };
            add_cloud_chat_remove_messages_operation(txn, peer, &operation)?;
        }
        txn.clear_history(peer)?;
    } else if peer.is_secret_chat() {
        txn.clear_history(peer)?;
        add_secret_chat_outgoing_operation(txn, peer, |layer| {
            let baseline_timestamp = take_pending_clear_history(txn, peer)?
                .map_or(now, |earliest| earliest.min(now));
            Ok(SecretChatOutgoingOperation::ClearHistory {
                layer,
                action_globally_unique_id: rand::random(),
                baseline_timestamp,
            })
        })?;
    }
    Ok(())
}

/// Remove every pending `ClearHistory` entry of `peer` and return the
/// earliest baseline among them.
fn take_pending_clear_history(
    txn: &Transaction<'_>,
    peer: ConversationId,
) -> Result<Option<i32>, CourierError> {
    let mut earliest: Option<i32> = None;
    for entry in txn.operation_log_entries(peer, OperationTag::SecretOutgoing)? {
        if let SecretChatOutgoingOperation::ClearHistory {
            baseline_timestamp, ..
        } = entry.decode::<SecretChatOutgoingOperation>()?
        {
            txn.operation_log_remove_entry(peer, entry.tag, entry.tag_local_index)?;
            earliest = Some(earliest.map_or(baseline_timestamp, |e| e.min(baseline_timestamp)));
            debug!(%peer, tag_local_index = entry.tag_local_index, "coalesced pending clear history");
        }
    }
    Ok(earliest)
}

fn add_cloud_chat_remove_messages_operation(
    txn: &Transaction<'_>,
    peer: ConversationId,
    operation: &CloudChatRemoveMessagesOperation,
) -> Result<(), CourierError> {
    txn.operation_log_add_entry(
        peer,
        OperationTag::CloudChatRemoveMessages,
        StorageIndex::Automatic,
        MergedIndex::Automatic,
        encode(operation)?,
    )?;
    Ok(())
}

/// Change the self-destruct timer of a secret session and tell the peer.
///
/// Returns `false` when there is no session or the timer already has this value.
pub fn set_secret_chat_message_autoremove_timeout_interactively(
    txn: &Transaction<'_>,
    peer: ConversationId,
    timeout: Option<i32>,
) -> Result<bool, CourierError> {
    let Some(state) = secret_chat_state(txn, peer)? else {
        return Ok(false);
    };
    if state.message_autoremove_timeout == timeout {
        return Ok(false);
    }

    let updated = state.with_message_autoremove_timeout(timeout);
    txn.set_peer_chat_state(peer, &updated)?;
    add_secret_chat_outgoing_operation(txn, peer, |layer| {
        Ok(SecretChatOutgoingOperation::SetMessageAutoremoveTimeout {
            layer,
            action_globally_unique_id: rand::random(),
            timeout: timeout.unwrap_or(0),
        })
    })?;
    Ok(true)
}

/// Notify the peer that a screenshot of `visible` messages was taken.
pub fn add_secret_chat_message_screenshot(
    txn: &Transaction<'_>,
    peer: ConversationId,
    visible: &[MessageId],
) -> Result<EnqueueOutcome, CourierError> {
    let mut globally_unique_ids = Vec::new();
    for id in visible.iter().filter(|id| id.peer == peer) {
        if let Some(guid) = txn.get_message(*id)?.and_then(|m| m.globally_unique_id) {
            globally_unique_ids.push(guid);
        }
    }
    add_secret_chat_outgoing_operation(txn, peer, |layer| {
        Ok(SecretChatOutgoingOperation::ScreenshotMessages {
            layer,
            action_globally_unique_id: rand::random(),
            globally_unique_ids,
        })
    })
}
