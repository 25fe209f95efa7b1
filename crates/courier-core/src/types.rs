// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifiers and record types shared by the store and the sync layer.

use std::fmt;

use bitflags::bitflags;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CourierError;

// --- Conversations ---

/// Namespace partition of a conversation identifier.
///
/// The namespace decides which read-state, state machine, and operation log
/// semantics apply to a conversation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PeerNamespace {
    /// One-to-one cloud conversation.
    CloudUser,
    /// Basic group.
    CloudGroup,
    /// Broadcast channel or supergroup.
    CloudChannel,
    /// End-to-end encrypted session.
    SecretChat,
    /// Synthetic account-wide scope (pinned list, installed collections).
    Global,
}

impl PeerNamespace {
    /// Conversations whose history lives on the server.
    pub fn is_cloud(self) -> bool {
        matches!(
            self,
            PeerNamespace::CloudUser | PeerNamespace::CloudGroup | PeerNamespace::CloudChannel
        )
    }
}

/// Identifier of a conversation. Immutable once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId {
    pub namespace: PeerNamespace,
    pub id: i64,
}

impl ConversationId {
    pub const fn new(namespace: PeerNamespace, id: i64) -> Self {
        Self { namespace, id }
    }

    /// A synthetic conversation used as the owner of account-wide operation streams.
    pub const fn global(id: i64) -> Self {
        Self {
            namespace: PeerNamespace::Global,
            id,
        }
    }

    pub fn is_secret_chat(&self) -> bool {
        self.namespace == PeerNamespace::SecretChat
    }

    /// The message namespace whose read state drives the unread badge.
    pub fn primary_read_namespace(&self) -> MessageNamespace {
        if self.is_secret_chat() {
            MessageNamespace::SecretIncoming
        } else {
            MessageNamespace::Cloud
        }
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.id)
    }
}

// --- Messages ---

/// Namespace of message ids within a conversation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageNamespace {
    /// Server-assigned ids.
    Cloud,
    /// Locally assigned ids (outgoing secret messages, unsent messages).
    Local,
    /// Incoming secret-session messages.
    SecretIncoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId {
    pub peer: ConversationId,
    pub namespace: MessageNamespace,
    pub id: i32,
}

impl MessageId {
    pub const fn new(peer: ConversationId, namespace: MessageNamespace, id: i32) -> Self {
        Self {
            peer,
            namespace,
            id,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.peer, self.namespace, self.id)
    }
}

/// A message id paired with its timestamp; the unit of read-cursor advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageIndex {
    pub id: MessageId,
    pub timestamp: i32,
}

impl MessageIndex {
    pub const fn new(id: MessageId, timestamp: i32) -> Self {
        Self { id, timestamp }
    }
}

bitflags! {
    /// Delivery and direction flags stored with each message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MessageFlags: u32 {
        const INCOMING = 1 << 0;
        const UNSENT = 1 << 1;
        const SENDING = 1 << 2;
        const FAILED = 1 << 3;
    }
}

impl MessageFlags {
    /// Flags of a message whose delivery has not been confirmed.
    pub const UNDELIVERED: Self = Self::UNSENT.union(Self::SENDING).union(Self::FAILED);

    /// Decode a stored column, dropping bits this build does not know.
    #[must_use]
    pub const fn from_stored(bits: u32) -> Self {
        Self::from_bits_truncate(bits)
    }
}

/// Typed attributes attached to a stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageAttribute {
    /// Self-destruct timer. `countdown_begin_time` of `None` or `Some(0)`
    /// means the countdown has not started.
    AutoremoveTimeout {
        timeout: i32,
        countdown_begin_time: Option<i32>,
    },
    /// The message was edited at `date`.
    Edited { date: i32 },
    /// Channel post signature.
    AuthorSignature { signature: String },
}

/// A message as persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// Random id shared with the remote side; secret-session operations refer
    /// to messages by this id.
    pub globally_unique_id: Option<i64>,
    pub timestamp: i32,
    pub flags: MessageFlags,
    pub text: String,
    pub attributes: Vec<MessageAttribute>,
    /// Ephemeral media placeholder (view-once photo/video).
    pub contains_secret_media: bool,
}

impl Message {
    pub fn index(&self) -> MessageIndex {
        MessageIndex::new(self.id, self.timestamp)
    }

    pub fn is_incoming(&self) -> bool {
        self.flags.contains(MessageFlags::INCOMING)
    }

    /// Returns `(timeout, countdown_begin_time)` of the first autoremove attribute.
    pub fn autoremove_timeout(&self) -> Option<(i32, Option<i32>)> {
        self.attributes.iter().find_map(|attribute| match attribute {
            MessageAttribute::AutoremoveTimeout {
                timeout,
                countdown_begin_time,
            } => Some((*timeout, *countdown_begin_time)),
            _ => None,
        })
    }
}

// --- Read state ---

/// Read cursors for one (conversation, message namespace) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadState {
    /// Highest incoming message id the local user has read.
    pub max_incoming_read_id: i32,
    /// Highest outgoing message id the remote side has read.
    pub max_outgoing_read_id: i32,
    /// Manually set unread mark.
    pub marked_unread: bool,
}

// --- Operation log ---

/// Partition of the outgoing operation log.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OperationTag {
    /// Layer-aware operations for a secret session.
    SecretOutgoing,
    /// Message deletion and history clearing in cloud conversations.
    CloudChatRemoveMessages,
    /// Pinned chat list reconciliation.
    SynchronizePinnedChats,
    /// Installed reference collection reconciliation.
    SynchronizeInstalledCollections,
    /// Read cursor propagation for cloud conversations.
    SynchronizeReadState,
}

impl OperationTag {
    pub const ALL: [OperationTag; 5] = [
        OperationTag::SecretOutgoing,
        OperationTag::CloudChatRemoveMessages,
        OperationTag::SynchronizePinnedChats,
        OperationTag::SynchronizeInstalledCollections,
        OperationTag::SynchronizeReadState,
    ];
}

/// How the per-(peer, tag) local index of a new entry is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageIndex {
    /// Allocate the next index from the per-(peer, tag) counter.
    Automatic,
    /// Use the given index; it must be above every index allocated so far.
    Manual(i32),
}

/// Whether a new entry takes part in the global merged ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergedIndex {
    Automatic,
    None,
}

/// A pending action awaiting remote acknowledgment.
///
/// `contents` is an opaque blob owned by the codec layer of the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationLogEntry {
    pub peer: ConversationId,
    pub tag: OperationTag,
    pub tag_local_index: i32,
    pub merged_index: Option<i64>,
    pub contents: Vec<u8>,
}

impl OperationLogEntry {
    /// Decodes the contents blob.
    pub fn decode<C: DeserializeOwned>(&self) -> Result<C, CourierError> {
        serde_json::from_slice(&self.contents).map_err(|e| {
            CourierError::codec(
                &format!(
                    "operation log entry {}/{}/{}",
                    self.peer, self.tag, self.tag_local_index
                ),
                e,
            )
        })
    }
}

// --- Self-destruct schedule ---

/// A scheduled timestamp-driven effect on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledAttribute {
    pub tag: u16,
    pub fire_at: i32,
    pub message_id: MessageId,
}

// --- Reference collections and cache ---

/// Low/high watermarks of a cached collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub low_water: usize,
    pub high_water: usize,
}

impl CollectionSpec {
    /// Watermarks must satisfy `1 <= low_water <= high_water`; a zero low
    /// watermark would evict the entry being written.
    pub fn validate(&self) -> Result<(), CourierError> {
        if self.low_water == 0 || self.low_water > self.high_water {
            return Err(CourierError::Config(format!(
                "invalid cache watermarks: low_water {} must be between 1 and high_water {}",
                self.low_water, self.high_water
            )));
        }
        Ok(())
    }
}

/// Address of one item cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemCacheEntryId {
    pub collection: i32,
    pub key: Vec<u8>,
}

/// A cached payload with the content hash it was fetched at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub id: ItemCacheEntryId,
    pub payload: Vec<u8>,
    pub content_hash: i32,
}

/// Kind of installable reference collection.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CollectionNamespace {
    Stickers,
    Masks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionId {
    pub namespace: CollectionNamespace,
    pub id: i64,
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.id)
    }
}

/// How a caller names a collection: by id, or by the short name used in
/// share links.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionReference {
    Id(CollectionId),
    ShortName(String),
}

impl fmt::Display for CollectionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::ShortName(name) => write!(f, "name:{name}"),
        }
    }
}

/// Metadata of a reference collection (sticker pack).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub id: CollectionId,
    pub access_hash: i64,
    pub title: String,
    pub short_name: String,
    /// Content hash as reported by the server.
    pub hash: i32,
    pub count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionItem {
    pub index: i32,
    pub file_id: i64,
    pub alt: String,
}

// --- Pinned chats ---

/// Chat list folder owning a pinned list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatListGroupId(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PinnedItemId {
    Peer { peer: ConversationId },
}
