// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message records.

use courier_core::{
    ConversationId, CourierError, Message, MessageAttribute, MessageFlags, MessageId,
    MessageIndex, MessageNamespace,
};
use rusqlite::{params, OptionalExtension, Row};

use super::{from_json, parse_text, peer_from_columns, peer_key, to_json};
use crate::database::{storage_err, Transaction};

const MESSAGE_COLUMNS: &str = "peer_ns, peer_id, namespace, id, globally_unique_id, timestamp, \
                               flags, text, attributes, contains_secret_media";

/// A message row before its text columns are decoded.
struct MessageRow {
    peer_ns: String,
    peer_id: i64,
    namespace: String,
    id: i32,
    globally_unique_id: Option<i64>,
    timestamp: i32,
    flags: u32,
    text: String,
    attributes: String,
    contains_secret_media: bool,
}

impl MessageRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            peer_ns: row.get(0)?,
            peer_id: row.get(1)?,
            namespace: row.get(2)?,
            id: row.get(3)?,
            globally_unique_id: row.get(4)?,
            timestamp: row.get(5)?,
            flags: row.get(6)?,
            text: row.get(7)?,
            attributes: row.get(8)?,
            contains_secret_media: row.get(9)?,
        })
    }

    fn into_message(self) -> Result<Message, CourierError> {
        let peer = peer_from_columns(&self.peer_ns, self.peer_id)?;
        let namespace: MessageNamespace = parse_text("message namespace", &self.namespace)?;
        let id = MessageId::new(peer, namespace, self.id);
        let attributes: Vec<MessageAttribute> =
            from_json(&format!("attributes of message {id}"), &self.attributes)?;
        Ok(Message {
            id,
            globally_unique_id: self.globally_unique_id,
            timestamp: self.timestamp,
            flags: MessageFlags::from_stored(self.flags),
            text: self.text,
            attributes,
            contains_secret_media: self.contains_secret_media,
        })
    }
}

impl Transaction<'_> {
    /// Insert or replace a message.
    pub fn store_message(&self, message: &Message) -> Result<(), CourierError> {
        let (ns, peer_id) = peer_key(message.id.peer);
        let attributes = to_json(
            &format!("attributes of message {}", message.id),
            &message.attributes,
        )?;
        self.sql()
            .execute(
                "INSERT OR REPLACE INTO messages (peer_ns, peer_id, namespace, id, globally_unique_id,
                     timestamp, flags, text, attributes, contains_secret_media)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    ns,
                    peer_id,
                    message.id.namespace.to_string(),
                    message.id.id,
                    message.globally_unique_id,
                    message.timestamp,
                    message.flags.bits(),
                    message.text,
                    attributes,
                    message.contains_secret_media,
                ],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn get_message(&self, id: MessageId) -> Result<Option<Message>, CourierError> {
        let (ns, peer_id) = peer_key(id.peer);
        let row = self
            .sql()
            .query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE peer_ns = ?1 AND peer_id = ?2 AND namespace = ?3 AND id = ?4"
                ),
                params![ns, peer_id, id.namespace.to_string(), id.id],
                MessageRow::from_row,
            )
            .optional()
            .map_err(storage_err)?;
        row.map(MessageRow::into_message).transpose()
    }

    /// Apply `update` to a stored message and persist it if anything changed.
    ///
    /// Returns `false` when the message does not exist or `update` left it as is.
    pub fn update_message<F>(&self, id: MessageId, update: F) -> Result<bool, CourierError>
    where
        F: FnOnce(&mut Message),
    {
        let Some(current) = self.get_message(id)? else {
            return Ok(false);
        };
        let mut updated = current.clone();
        update(&mut updated);
        if updated == current {
            return Ok(false);
        }
        self.store_message(&updated)?;
        Ok(true)
    }

    /// Messages of one namespace with `after < id <= up_to`, ascending by id.
    pub fn messages_in_id_range(
        &self,
        peer: ConversationId,
        namespace: MessageNamespace,
        after: i32,
        up_to: i32,
    ) -> Result<Vec<Message>, CourierError> {
        let (ns, peer_id) = peer_key(peer);
        let mut stmt = self
            .sql()
            .prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE peer_ns = ?1 AND peer_id = ?2 AND namespace = ?3 AND id > ?4 AND id <= ?5
                 ORDER BY id ASC"
            ))
            .map_err(storage_err)?;
        let rows = stmt
            .query_map(
                params![ns, peer_id, namespace.to_string(), after, up_to],
                MessageRow::from_row,
            )
            .map_err(storage_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_err)?;
        rows.into_iter().map(MessageRow::into_message).collect()
    }

    /// Index of the message with the highest id in a namespace.
    pub fn top_message_index(
        &self,
        peer: ConversationId,
        namespace: MessageNamespace,
    ) -> Result<Option<MessageIndex>, CourierError> {
        let (ns, peer_id) = peer_key(peer);
        let top: Option<(i32, i32)> = self
            .sql()
            .query_row(
                "SELECT id, timestamp FROM messages
                 WHERE peer_ns = ?1 AND peer_id = ?2 AND namespace = ?3
                 ORDER BY id DESC LIMIT 1",
                params![ns, peer_id, namespace.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(storage_err)?;
        Ok(top.map(|(id, timestamp)| {
            MessageIndex::new(MessageId::new(peer, namespace, id), timestamp)
        }))
    }

    /// Delete messages together with their scheduled timestamp attributes.
    /// Returns the number of messages removed.
    pub fn delete_messages(&self, ids: &[MessageId]) -> Result<usize, CourierError> {
        let mut removed = 0;
        for id in ids {
            let (ns, peer_id) = peer_key(id.peer);
            let namespace = id.namespace.to_string();
            removed += self
                .sql()
                .execute(
                    "DELETE FROM messages
                     WHERE peer_ns = ?1 AND peer_id = ?2 AND namespace = ?3 AND id = ?4",
                    params![ns, peer_id, namespace, id.id],
                )
                .map_err(storage_err)?;
            self.sql()
                .execute(
                    "DELETE FROM timestamp_attributes
                     WHERE peer_ns = ?1 AND peer_id = ?2 AND namespace = ?3 AND message_id = ?4",
                    params![ns, peer_id, namespace, id.id],
                )
                .map_err(storage_err)?;
        }
        Ok(removed)
    }

    /// Delete every message of a conversation. Returns the number removed.
    pub fn clear_history(&self, peer: ConversationId) -> Result<usize, CourierError> {
        let (ns, peer_id) = peer_key(peer);
        let removed = self
            .sql()
            .execute(
                "DELETE FROM messages WHERE peer_ns = ?1 AND peer_id = ?2",
                params![ns, peer_id],
            )
            .map_err(storage_err)?;
        self.sql()
            .execute(
                "DELETE FROM timestamp_attributes WHERE peer_ns = ?1 AND peer_id = ?2",
                params![ns, peer_id],
            )
            .map_err(storage_err)?;
        Ok(removed)
    }
}
