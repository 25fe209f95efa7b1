// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read cursors per (conversation, message namespace).
//!
//! Cursors only move forward. The manual unread mark is the one piece of
//! read state that can make a conversation look less read.

use courier_core::{
    ConversationId, CourierError, MessageFlags, MessageId, MessageIndex, MessageNamespace,
    ReadState,
};
use rusqlite::{params, OptionalExtension};
use tracing::trace;

use super::{peer_from_columns, peer_key};
use crate::database::{storage_err, Transaction};

impl Transaction<'_> {
    /// Read state of one namespace; the default state when none was stored.
    pub fn get_read_state(
        &self,
        peer: ConversationId,
        namespace: MessageNamespace,
    ) -> Result<ReadState, CourierError> {
        let (ns, id) = peer_key(peer);
        let state = self
            .sql()
            .query_row(
                "SELECT max_incoming_read_id, max_outgoing_read_id, marked_unread
                 FROM read_states WHERE peer_ns = ?1 AND peer_id = ?2 AND namespace = ?3",
                params![ns, id, namespace.to_string()],
                |row| {
                    Ok(ReadState {
                        max_incoming_read_id: row.get(0)?,
                        max_outgoing_read_id: row.get(1)?,
                        marked_unread: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(storage_err)?;
        Ok(state.unwrap_or_default())
    }

    fn put_read_state(
        &self,
        peer: ConversationId,
        namespace: MessageNamespace,
        state: &ReadState,
    ) -> Result<(), CourierError> {
        let (ns, id) = peer_key(peer);
        self.sql()
            .execute(
                "INSERT INTO read_states (peer_ns, peer_id, namespace, max_incoming_read_id,
                     max_outgoing_read_id, marked_unread)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(peer_ns, peer_id, namespace) DO UPDATE SET
                     max_incoming_read_id = excluded.max_incoming_read_id,
                     max_outgoing_read_id = excluded.max_outgoing_read_id,
                     marked_unread = excluded.marked_unread",
                params![
                    ns,
                    id,
                    namespace.to_string(),
                    state.max_incoming_read_id,
                    state.max_outgoing_read_id,
                    state.marked_unread,
                ],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    /// Advance the local user's incoming read cursor to `index`.
    ///
    /// Returns the incoming messages that became read, i.e. those with ids in
    /// `(old cursor, index]`. A non-advancing index returns nothing. Reading
    /// also clears the manual unread mark.
    pub fn apply_interactive_read_max_index(
        &self,
        index: MessageIndex,
    ) -> Result<Vec<MessageId>, CourierError> {
        let peer = index.id.peer;
        let namespace = index.id.namespace;
        let current = self.get_read_state(peer, namespace)?;

        let mut updated = current;
        updated.marked_unread = false;
        let mut affected = Vec::new();
        if index.id.id > current.max_incoming_read_id {
            affected = self
                .messages_in_id_range(peer, namespace, current.max_incoming_read_id, index.id.id)?
                .into_iter()
                .filter(|message| message.is_incoming())
                .map(|message| message.id)
                .collect();
            updated.max_incoming_read_id = index.id.id;
        }

        if updated != current {
            self.put_read_state(peer, namespace, &updated)?;
            trace!(%peer, %namespace, max = updated.max_incoming_read_id, affected = affected.len(), "incoming read cursor advanced");
        }
        Ok(affected)
    }

    /// Advance the remote side's read cursor over our outgoing messages.
    ///
    /// Returns the outgoing messages with ids in `(old cursor, index]`.
    pub fn apply_outgoing_read_max_index(
        &self,
        index: MessageIndex,
    ) -> Result<Vec<MessageId>, CourierError> {
        let peer = index.id.peer;
        let namespace = index.id.namespace;
        let current = self.get_read_state(peer, namespace)?;
        if index.id.id <= current.max_outgoing_read_id {
            return Ok(Vec::new());
        }

        let affected = self
            .messages_in_id_range(peer, namespace, current.max_outgoing_read_id, index.id.id)?
            .into_iter()
            .filter(|message| !message.flags.contains(MessageFlags::INCOMING))
            .map(|message| message.id)
            .collect::<Vec<_>>();
        let updated = ReadState {
            max_outgoing_read_id: index.id.id,
            ..current
        };
        self.put_read_state(peer, namespace, &updated)?;
        trace!(%peer, %namespace, max = index.id.id, affected = affected.len(), "outgoing read cursor advanced");
        Ok(affected)
    }

    /// Whether the remote side has read the outgoing message at `index`.
    pub fn is_outgoing_message_index_read(&self, index: MessageIndex) -> Result<bool, CourierError> {
        let state = self.get_read_state(index.id.peer, index.id.namespace)?;
        Ok(index.id.id <= state.max_outgoing_read_id)
    }

    /// Set or clear the manual unread mark. Returns whether it changed.
    pub fn apply_mark_unread(
        &self,
        peer: ConversationId,
        namespace: MessageNamespace,
        value: bool,
    ) -> Result<bool, CourierError> {
        let current = self.get_read_state(peer, namespace)?;
        if current.marked_unread == value {
            return Ok(false);
        }
        self.put_read_state(
            peer,
            namespace,
            &ReadState {
                marked_unread: value,
                ..current
            },
        )?;
        Ok(true)
    }

    /// Marked unread, or an incoming message above the incoming cursor exists.
    pub fn is_peer_unread(
        &self,
        peer: ConversationId,
        namespace: MessageNamespace,
    ) -> Result<bool, CourierError> {
        let state = self.get_read_state(peer, namespace)?;
        if state.marked_unread {
            return Ok(true);
        }
        let (ns, id) = peer_key(peer);
        self.sql()
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM messages
                     WHERE peer_ns = ?1 AND peer_id = ?2 AND namespace = ?3
                       AND id > ?4 AND (flags & ?5) != 0)",
                params![
                    ns,
                    id,
                    namespace.to_string(),
                    state.max_incoming_read_id,
                    MessageFlags::INCOMING.bits(),
                ],
                |row| row.get(0),
            )
            .map_err(storage_err)
    }

    /// Conversations that are unread in any namespace.
    pub fn unread_peer_ids(&self) -> Result<Vec<ConversationId>, CourierError> {
        let mut stmt = self
            .sql()
            .prepare(
                "SELECT m.peer_ns, m.peer_id FROM messages m
                 LEFT JOIN read_states r
                   ON r.peer_ns = m.peer_ns AND r.peer_id = m.peer_id AND r.namespace = m.namespace
                 WHERE (m.flags & ?1) != 0 AND m.id > COALESCE(r.max_incoming_read_id, 0)
                 UNION
                 SELECT peer_ns, peer_id FROM read_states WHERE marked_unread != 0
                 ORDER BY 1, 2",
            )
            .map_err(storage_err)?;
        let rows = stmt
            .query_map(params![MessageFlags::INCOMING.bits()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(storage_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_err)?;
        rows.iter()
            .map(|(ns, id)| peer_from_columns(ns, *id))
            .collect()
    }
}
