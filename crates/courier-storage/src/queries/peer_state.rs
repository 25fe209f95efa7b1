// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-peer protocol state blobs.
//!
//! States are replaced wholesale. Callers compare the updated value with the
//! current one and only write when they differ.

use courier_core::{ConversationId, CourierError};
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{from_json, peer_key, to_json};
use crate::database::{storage_err, Transaction};

impl Transaction<'_> {
    pub fn get_peer_chat_state<S: DeserializeOwned>(
        &self,
        peer: ConversationId,
    ) -> Result<Option<S>, CourierError> {
        let (ns, id) = peer_key(peer);
        let raw: Option<String> = self
            .sql()
            .query_row(
                "SELECT state FROM peer_chat_states WHERE peer_ns = ?1 AND peer_id = ?2",
                params![ns, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_err)?;

        raw.map(|text| from_json(&format!("peer chat state {peer}"), &text))
            .transpose()
    }

    pub fn set_peer_chat_state<S: Serialize>(
        &self,
        peer: ConversationId,
        state: &S,
    ) -> Result<(), CourierError> {
        let (ns, id) = peer_key(peer);
        let text = to_json(&format!("peer chat state {peer}"), state)?;
        self.sql()
            .execute(
                "INSERT INTO peer_chat_states (peer_ns, peer_id, state) VALUES (?1, ?2, ?3)
                 ON CONFLICT(peer_ns, peer_id) DO UPDATE SET state = excluded.state",
                params![ns, id, text],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    /// Drops the state of a deleted conversation. Returns whether one existed.
    pub fn remove_peer_chat_state(&self, peer: ConversationId) -> Result<bool, CourierError> {
        let (ns, id) = peer_key(peer);
        let removed = self
            .sql()
            .execute(
                "DELETE FROM peer_chat_states WHERE peer_ns = ?1 AND peer_id = ?2",
                params![ns, id],
            )
            .map_err(storage_err)?;
        Ok(removed > 0)
    }
}
