// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coalescing reconciliation operations.
//!
//! Each helper keeps at most one pending entry per (peer, tag). A new request
//! removes the pending entry and enqueues a merged one that still carries the
//! oldest baseline, so the server diffs against the state it last knew.

use courier_core::{
    ChatListGroupId, CollectionId, CollectionInfo, CollectionItem, CollectionNamespace,
    ConversationId, CourierError, MergedIndex, MessageNamespace, OperationLogEntry, OperationTag,
    PinnedItemId, StorageIndex,
};
use courier_storage::Transaction;
use tracing::debug;

use crate::contents::{
    encode, SynchronizeInstalledCollectionsOperation, SynchronizePinnedChatsOperation,
    SynchronizeReadStateOperation,
};

/// Owner of the pinned list stream of a chat list group.
pub fn pinned_chats_peer(group: ChatListGroupId) -> ConversationId {
    ConversationId::global(i64::from(group.0))
}

/// Owner of the installed collections stream of a namespace.
pub fn installed_collections_peer(namespace: CollectionNamespace) -> ConversationId {
    match namespace {
        CollectionNamespace::Stickers => ConversationId::global(0),
        CollectionNamespace::Masks => ConversationId::global(1),
    }
}

/// The oldest pending entry of (peer, tag), decoded.
fn first_pending<C: serde::de::DeserializeOwned>(
    txn: &Transaction<'_>,
    peer: ConversationId,
    tag: OperationTag,
) -> Result<Option<(OperationLogEntry, C)>, CourierError> {
    match txn.operation_log_first_entry(peer, tag)? {
        Some(entry) => {
            let contents = entry.decode::<C>()?;
            Ok(Some((entry, contents)))
        }
        None => Ok(None),
    }
}

fn replace_pending(
    txn: &Transaction<'_>,
    peer: ConversationId,
    tag: OperationTag,
    previous: Option<&OperationLogEntry>,
    contents: Vec<u8>,
) -> Result<OperationLogEntry, CourierError> {
    if let Some(previous) = previous {
        txn.operation_log_remove_entry(peer, tag, previous.tag_local_index)?;
        debug!(%peer, %tag, replaced = previous.tag_local_index, "coalesced pending operation");
    }
    txn.operation_log_add_entry(
        peer,
        tag,
        StorageIndex::Automatic,
        MergedIndex::Automatic,
        contents,
    )
}

/// Queue a pinned list reconciliation for `group`.
///
/// Call before changing the local pinned list: with nothing pending, the
/// current list becomes the baseline.
pub fn add_synchronize_pinned_chats_operation(
    txn: &Transaction<'_>,
    group: ChatListGroupId,
) -> Result<OperationLogEntry, CourierError> {
    let peer = pinned_chats_peer(group);
    let tag = OperationTag::SynchronizePinnedChats;

    let pending = first_pending::<SynchronizePinnedChatsOperation>(txn, peer, tag)?;
    let previous_item_ids = match &pending {
        Some((_, contents)) => contents.previous_item_ids.clone(),
        None => txn.get_pinned_item_ids(group)?,
    };

    let operation = SynchronizePinnedChatsOperation { previous_item_ids };
    replace_pending(txn, peer, tag, pending.as_ref().map(|(e, _)| e), encode(&operation)?)
}

/// Replace the pinned list of `group` and queue its reconciliation.
pub fn set_pinned_chats_interactively(
    txn: &Transaction<'_>,
    group: ChatListGroupId,
    items: &[PinnedItemId],
) -> Result<(), CourierError> {
    add_synchronize_pinned_chats_operation(txn, group)?;
    txn.set_pinned_item_ids(group, items)
}

/// A local change to the installed collection set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstalledCollectionsChange {
    /// No set change; only forces a reconciliation.
    Sync,
    Add(Vec<CollectionId>),
    Remove(Vec<CollectionId>),
    Archive(Vec<CollectionId>),
}

/// Queue an installed collections reconciliation for `namespace`.
///
/// Call before applying `change` locally.
pub fn add_synchronize_installed_collections_operation(
    txn: &Transaction<'_>,
    namespace: CollectionNamespace,
    change: &InstalledCollectionsChange,
) -> Result<OperationLogEntry, CourierError> {
    let peer = installed_collections_peer(namespace);
    let tag = OperationTag::SynchronizeInstalledCollections;

    let pending = first_pending::<SynchronizeInstalledCollectionsOperation>(txn, peer, tag)?;
    let (previous_collections, mut archived_collections) = match &pending {
        Some((_, contents)) => (
            contents.previous_collections.clone(),
            contents.archived_collections.clone(),
        ),
        None => (
            txn.get_item_collection_infos(namespace)?
                .into_iter()
                .map(|info| info.id)
                .collect(),
            Vec::new(),
        ),
    };

    match change {
        InstalledCollectionsChange::Sync => {}
        InstalledCollectionsChange::Add(ids) | InstalledCollectionsChange::Remove(ids) => {
            archived_collections.retain(|id| !ids.contains(id));
        }
        InstalledCollectionsChange::Archive(ids) => {
            for id in ids {
                if !archived_collections.contains(id) {
                    archived_collections.push(*id);
                }
            }
        }
    }

    let operation = SynchronizeInstalledCollectionsOperation {
        previous_collections,
        archived_collections,
    };
    replace_pending(txn, peer, tag, pending.as_ref().map(|(e, _)| e), encode(&operation)?)
}

/// Install a collection locally, moving it to the front if already installed.
pub fn add_collection_interactively(
    txn: &Transaction<'_>,
    info: CollectionInfo,
    items: Vec<CollectionItem>,
) -> Result<(), CourierError> {
    let namespace = info.id.namespace;
    add_synchronize_installed_collections_operation(
        txn,
        namespace,
        &InstalledCollectionsChange::Add(vec![info.id]),
    )?;

    let mut infos = txn.get_item_collection_infos(namespace)?;
    let id = info.id;
    let newly_installed = match infos.iter().position(|existing| existing.id == id) {
        Some(position) => {
            let current = infos.remove(position);
            infos.insert(0, current);
            false
        }
        None => {
            infos.insert(0, info);
            true
        }
    };
    txn.replace_item_collection_infos(namespace, &infos)?;
    if newly_installed {
        txn.replace_item_collection_items(id, &items)?;
    }
    debug!(collection = %id, newly_installed, "collection installed");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveCollectionOption {
    Delete,
    Archive,
}

/// Uninstall a collection locally, queueing a delete or archive for the server.
pub fn remove_collection_interactively(
    txn: &Transaction<'_>,
    id: CollectionId,
    option: RemoveCollectionOption,
) -> Result<(), CourierError> {
    let change = match option {
        RemoveCollectionOption::Delete => InstalledCollectionsChange::Remove(vec![id]),
        RemoveCollectionOption::Archive => InstalledCollectionsChange::Archive(vec![id]),
    };
    add_synchronize_installed_collections_operation(txn, id.namespace, &change)?;
    txn.remove_item_collection(id)?;
    Ok(())
}

/// Queue propagation of a cloud conversation's incoming read cursor.
///
/// Pending entries for the same namespace are merged; the newest cursor wins.
pub fn add_synchronize_read_state_operation(
    txn: &Transaction<'_>,
    peer: ConversationId,
    namespace: MessageNamespace,
    max_read_id: i32,
) -> Result<OperationLogEntry, CourierError> {
    let tag = OperationTag::SynchronizeReadState;
    let mut max_read_id = max_read_id;
    for entry in txn.operation_log_entries(peer, tag)? {
        let pending = entry.decode::<SynchronizeReadStateOperation>()?;
        if pending.namespace == namespace {
            max_read_id = max_read_id.max(pending.max_read_id);
            txn.operation_log_remove_entry(peer, tag, entry.tag_local_index)?;
        }
    }

    let operation = SynchronizeReadStateOperation {
        namespace,
        max_read_id,
    };
    txn.operation_log_add_entry(
        peer,
        tag,
        StorageIndex::Automatic,
        MergedIndex::Automatic,
        encode(&operation)?,
    )
}
