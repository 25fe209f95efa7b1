// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier persistence and synchronization core.
//!
//! This crate provides the error taxonomy, the identifier and record types
//! shared between the store and the sync layer, and the traits through which
//! external collaborators (clock, remote collections, network delivery) are
//! injected.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use types::{
    CacheEntry, ChatListGroupId, CollectionId, CollectionInfo, CollectionItem,
    CollectionNamespace, CollectionReference, CollectionSpec, ConversationId, ItemCacheEntryId,
    MergedIndex, Message, MessageAttribute, MessageFlags, MessageId, MessageIndex,
    MessageNamespace, OperationLogEntry, OperationTag, PeerNamespace, PinnedItemId, ReadState,
    ScheduledAttribute, StorageIndex,
};

pub use traits::{
    Clock, CollectionSource, OperationDelivery, RemoteCollection, RemoteQueryResult, SystemClock,
};
