// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payloads stored in operation log entries, one type per tag.

use courier_core::{CollectionId, CourierError, MessageNamespace, PinnedItemId};
use serde::{Deserialize, Serialize};

use crate::secret_chat::SecretChatLayer;

/// Serialize an operation payload into entry contents.
pub fn encode<T: Serialize>(operation: &T) -> Result<Vec<u8>, CourierError> {
    serde_json::to_vec(operation).map_err(|e| CourierError::codec("operation contents", e))
}

/// Layer-aware actions queued on [`OperationTag::SecretOutgoing`](courier_core::OperationTag::SecretOutgoing).
///
/// `action_globally_unique_id` is the idempotency key the remote side uses to
/// drop duplicates under at-least-once delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecretChatOutgoingOperation {
    DeleteMessages {
        layer: SecretChatLayer,
        action_globally_unique_id: i64,
        globally_unique_ids: Vec<i64>,
    },
    ClearHistory {
        layer: SecretChatLayer,
        action_globally_unique_id: i64,
        /// When the oldest still pending clear was requested.
        baseline_timestamp: i32,
    },
    SetMessageAutoremoveTimeout {
        layer: SecretChatLayer,
        action_globally_unique_id: i64,
        /// Zero disables the timer.
        timeout: i32,
    },
    ScreenshotMessages {
        layer: SecretChatLayer,
        action_globally_unique_id: i64,
        globally_unique_ids: Vec<i64>,
    },
}

/// Who a deletion applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionType {
    ForLocalPeer,
    ForEveryone,
}

/// Actions queued on [`OperationTag::CloudChatRemoveMessages`](courier_core::OperationTag::CloudChatRemoveMessages).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CloudChatRemoveMessagesOperation {
    RemoveMessages {
        message_ids: Vec<i32>,
        deletion: DeletionType,
    },
    ClearHistory {
        top_message_id: i32,
        deletion: DeletionType,
    },
}

/// Pending pinned list reconciliation. The remote side diffs the current
/// pinned list against `previous_item_ids`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynchronizePinnedChatsOperation {
    pub previous_item_ids: Vec<PinnedItemId>,
}

/// Pending installed collections reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynchronizeInstalledCollectionsOperation {
    /// Installed set before the first pending local change.
    pub previous_collections: Vec<CollectionId>,
    /// Collections archived by pending local changes.
    pub archived_collections: Vec<CollectionId>,
}

/// Pending read cursor propagation for a cloud conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynchronizeReadStateOperation {
    pub namespace: MessageNamespace,
    pub max_read_id: i32,
}
