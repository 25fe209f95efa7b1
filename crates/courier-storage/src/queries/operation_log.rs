// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outgoing operation log: a durable FIFO per (peer, tag).
//!
//! Local indices come from a per-(peer, tag) counter that survives removals,
//! so an index is never handed out twice. Merged indices come from one global
//! counter shared by all tags.

use courier_core::{
    ConversationId, CourierError, MergedIndex, OperationLogEntry, OperationTag, StorageIndex,
};
use rusqlite::{params, OptionalExtension, Row};
use tracing::trace;

use super::{parse_text, peer_from_columns, peer_key};
use crate::database::{storage_err, Transaction};

const MERGED_INDEX_COUNTER: &str = "operation_log_merged_index";

struct EntryRow {
    peer_ns: String,
    peer_id: i64,
    tag: String,
    tag_local_index: i32,
    merged_index: Option<i64>,
    contents: Vec<u8>,
}

impl EntryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            peer_ns: row.get(0)?,
            peer_id: row.get(1)?,
            tag: row.get(2)?,
            tag_local_index: row.get(3)?,
            merged_index: row.get(4)?,
            contents: row.get(5)?,
        })
    }

    fn into_entry(self) -> Result<OperationLogEntry, CourierError> {
        Ok(OperationLogEntry {
            peer: peer_from_columns(&self.peer_ns, self.peer_id)?,
            tag: parse_text("operation tag", &self.tag)?,
            tag_local_index: self.tag_local_index,
            merged_index: self.merged_index,
            contents: self.contents,
        })
    }
}

impl Transaction<'_> {
    /// The local index [`StorageIndex::Automatic`] would allocate next.
    pub fn operation_log_next_local_index(
        &self,
        peer: ConversationId,
        tag: OperationTag,
    ) -> Result<i32, CourierError> {
        let (ns, id) = peer_key(peer);
        let next: Option<i32> = self
            .sql()
            .query_row(
                "SELECT next_index FROM operation_log_indices
                 WHERE peer_ns = ?1 AND peer_id = ?2 AND tag = ?3",
                params![ns, id, tag.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_err)?;
        Ok(next.unwrap_or(0))
    }

    /// Append an entry. Returns the entry as stored.
    pub fn operation_log_add_entry(
        &self,
        peer: ConversationId,
        tag: OperationTag,
        local_index: StorageIndex,
        merged_index: MergedIndex,
        contents: Vec<u8>,
    ) -> Result<OperationLogEntry, CourierError> {
        let next = self.operation_log_next_local_index(peer, tag)?;
        let tag_local_index = match local_index {
            StorageIndex::Automatic => next,
            StorageIndex::Manual(index) if index >= next => index,
            StorageIndex::Manual(index) => {
                return Err(CourierError::Internal(format!(
                    "manual operation log index {index} for {peer}/{tag} is below the next free index {next}"
                )));
            }
        };

        let following = tag_local_index.checked_add(1).ok_or_else(|| {
            CourierError::Internal(format!(
                "operation log index space exhausted for {peer}/{tag}"
            ))
        })?;

        let (ns, id) = peer_key(peer);
        let tag_text = tag.to_string();
        self.sql()
            .execute(
                "INSERT INTO operation_log_indices (peer_ns, peer_id, tag, next_index)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(peer_ns, peer_id, tag) DO UPDATE SET next_index = excluded.next_index",
                params![ns, id, tag_text, following],
            )
            .map_err(storage_err)?;

        let merged_index = match merged_index {
            MergedIndex::Automatic => Some(self.next_counter_value(MERGED_INDEX_COUNTER)?),
            MergedIndex::None => None,
        };

        self.sql()
            .execute(
                "INSERT INTO operation_log (peer_ns, peer_id, tag, tag_local_index, merged_index, contents)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![ns, id, tag_text, tag_local_index, merged_index, contents],
            )
            .map_err(storage_err)?;

        trace!(%peer, %tag, tag_local_index, "operation log entry added");
        Ok(OperationLogEntry {
            peer,
            tag,
            tag_local_index,
            merged_index,
            contents,
        })
    }

    /// Remove one entry. Returns `false` if it was already gone.
    pub fn operation_log_remove_entry(
        &self,
        peer: ConversationId,
        tag: OperationTag,
        tag_local_index: i32,
    ) -> Result<bool, CourierError> {
        let (ns, id) = peer_key(peer);
        let removed = self
            .sql()
            .execute(
                "DELETE FROM operation_log
                 WHERE peer_ns = ?1 AND peer_id = ?2 AND tag = ?3 AND tag_local_index = ?4",
                params![ns, id, tag.to_string(), tag_local_index],
            )
            .map_err(storage_err)?;
        Ok(removed > 0)
    }

    /// Visit the entries of (peer, tag) in ascending local index order until
    /// `visitor` returns `false`.
    pub fn operation_log_enumerate_entries<F>(
        &self,
        peer: ConversationId,
        tag: OperationTag,
        mut visitor: F,
    ) -> Result<(), CourierError>
    where
        F: FnMut(&OperationLogEntry) -> bool,
    {
        for entry in self.operation_log_entries(peer, tag)? {
            if !visitor(&entry) {
                break;
            }
        }
        Ok(())
    }

    /// All entries of (peer, tag), ascending by local index.
    pub fn operation_log_entries(
        &self,
        peer: ConversationId,
        tag: OperationTag,
    ) -> Result<Vec<OperationLogEntry>, CourierError> {
        let (ns, id) = peer_key(peer);
        let mut stmt = self
            .sql()
            .prepare(
                "SELECT peer_ns, peer_id, tag, tag_local_index, merged_index, contents
                 FROM operation_log
                 WHERE peer_ns = ?1 AND peer_id = ?2 AND tag = ?3
                 ORDER BY tag_local_index ASC",
            )
            .map_err(storage_err)?;
        let rows = stmt
            .query_map(params![ns, id, tag.to_string()], EntryRow::from_row)
            .map_err(storage_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_err)?;
        rows.into_iter().map(EntryRow::into_entry).collect()
    }

    /// The oldest pending entry of (peer, tag).
    pub fn operation_log_first_entry(
        &self,
        peer: ConversationId,
        tag: OperationTag,
    ) -> Result<Option<OperationLogEntry>, CourierError> {
        let (ns, id) = peer_key(peer);
        let row = self
            .sql()
            .query_row(
                "SELECT peer_ns, peer_id, tag, tag_local_index, merged_index, contents
                 FROM operation_log
                 WHERE peer_ns = ?1 AND peer_id = ?2 AND tag = ?3
                 ORDER BY tag_local_index ASC LIMIT 1",
                params![ns, id, tag.to_string()],
                EntryRow::from_row,
            )
            .optional()
            .map_err(storage_err)?;
        row.map(EntryRow::into_entry).transpose()
    }

    /// Peers with at least one pending entry for `tag`, ordered by the
    /// position of their oldest entry in the merged ordering.
    pub fn operation_log_peers_with_entries(
        &self,
        tag: OperationTag,
    ) -> Result<Vec<ConversationId>, CourierError> {
        let mut stmt = self
            .sql()
            .prepare(
                "SELECT peer_ns, peer_id FROM operation_log
                 WHERE tag = ?1
                 GROUP BY peer_ns, peer_id
                 ORDER BY MIN(COALESCE(merged_index, 0)), peer_ns, peer_id",
            )
            .map_err(storage_err)?;
        let rows = stmt
            .query_map(params![tag.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(storage_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_err)?;
        rows.iter()
            .map(|(ns, id)| peer_from_columns(ns, *id))
            .collect()
    }

    /// Number of pending entries for `tag` across all peers.
    pub fn operation_log_count(&self, tag: OperationTag) -> Result<usize, CourierError> {
        let count: i64 = self
            .sql()
            .query_row(
                "SELECT COUNT(*) FROM operation_log WHERE tag = ?1",
                params![tag.to_string()],
                |row| row.get(0),
            )
            .map_err(storage_err)?;
        Ok(count as usize)
    }

    fn next_counter_value(&self, name: &str) -> Result<i64, CourierError> {
        self.sql()
            .query_row(
                "INSERT INTO counters (name, value) VALUES (?1, 1)
                 ON CONFLICT(name) DO UPDATE SET value = value + 1
                 RETURNING value",
                params![name],
                |row| row.get(0),
            )
            .map_err(storage_err)
    }
}

#[cfg(test)]
mod tests {
    use courier_core::PeerNamespace;

    use super::*;
    use crate::Database;

    const PEER: ConversationId = ConversationId::new(PeerNamespace::SecretChat, 42);
    const TAG: OperationTag = OperationTag::SecretOutgoing;

    #[tokio::test]
    async fn indices_increase_and_are_never_reused() {
        let db = Database::open_in_memory().await.unwrap();
        let indices = db
            .transaction(|txn| {
                let a = txn.operation_log_add_entry(PEER, TAG, StorageIndex::Automatic, MergedIndex::None, vec![1])?;
                let b = txn.operation_log_add_entry(PEER, TAG, StorageIndex::Automatic, MergedIndex::None, vec![2])?;
                assert!(txn.operation_log_remove_entry(PEER, TAG, b.tag_local_index)?);
                assert!(!txn.operation_log_remove_entry(PEER, TAG, b.tag_local_index)?);
                let c = txn.operation_log_add_entry(PEER, TAG, StorageIndex::Automatic, MergedIndex::None, vec![3])?;
                Ok(vec![a.tag_local_index, b.tag_local_index, c.tag_local_index])
            })
            .await
            .unwrap();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn manual_index_must_not_go_backwards() {
        let db = Database::open_in_memory().await.unwrap();
        let result = db
            .transaction(|txn| {
                let entry = txn.operation_log_add_entry(PEER, TAG, StorageIndex::Manual(10), MergedIndex::None, vec![])?;
                assert_eq!(entry.tag_local_index, 10);
                assert_eq!(txn.operation_log_next_local_index(PEER, TAG)?, 11);
                txn.operation_log_add_entry(PEER, TAG, StorageIndex::Manual(5), MergedIndex::None, vec![])
            })
            .await;
        assert!(matches!(result, Err(CourierError::Internal(_))));
    }

    #[tokio::test]
    async fn exhausted_index_space_is_an_error_not_a_crash() {
        let db = Database::open_in_memory().await.unwrap();
        let result = db
            .transaction(|txn| {
                txn.operation_log_add_entry(PEER, TAG, StorageIndex::Manual(i32::MAX), MergedIndex::None, vec![])
            })
            .await;
        assert!(matches!(result, Err(CourierError::Internal(_))));

        let next = db
            .transaction(|txn| {
                let entry = txn.operation_log_add_entry(PEER, TAG, StorageIndex::Automatic, MergedIndex::None, vec![])?;
                Ok(entry.tag_local_index)
            })
            .await
            .unwrap();
        assert_eq!(next, 0);
    }

    #[tokio::test]
    async fn enumerate_stops_when_visitor_declines() {
        let db = Database::open_in_memory().await.unwrap();
        let seen = db
            .transaction(|txn| {
                for byte in 0..4u8 {
                    txn.operation_log_add_entry(PEER, TAG, StorageIndex::Automatic, MergedIndex::None, vec![byte])?;
                }
                let mut seen = Vec::new();
                txn.operation_log_enumerate_entries(PEER, TAG, |entry| {
                    seen.push(entry.contents[0]);
                    seen.len() < 2
                })?;
                Ok(seen)
            })
            .await
            .unwrap();
        assert_eq!(seen, vec![0, 1]);
    }

    #[tokio::test]
    async fn merged_index_is_global_and_peers_are_listed_oldest_first() {
        let db = Database::open_in_memory().await.unwrap();
        let other = ConversationId::new(PeerNamespace::CloudUser, 1);
        let tag = OperationTag::CloudChatRemoveMessages;
        let (first, second, peers, count) = db
            .transaction(move |txn| {
                let first = txn.operation_log_add_entry(other, tag, StorageIndex::Automatic, MergedIndex::Automatic, vec![])?;
                let second = txn.operation_log_add_entry(PEER, tag, StorageIndex::Automatic, MergedIndex::Automatic, vec![])?;
                let peers = txn.operation_log_peers_with_entries(tag)?;
                let count = txn.operation_log_count(tag)?;
                Ok((first, second, peers, count))
            })
            .await
            .unwrap();
        assert_eq!(first.merged_index, Some(1));
        assert_eq!(second.merged_index, Some(2));
        assert_eq!(peers, vec![other, PEER]);
        assert_eq!(count, 2);
    }
}
