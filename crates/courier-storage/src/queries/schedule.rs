// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timestamp-indexed schedule of per-message effects.
//!
//! At most one entry exists per (tag, message). Scheduling again replaces
//! the fire time.

use courier_core::{CourierError, MessageId, MessageNamespace, ScheduledAttribute};
use rusqlite::params;

use super::{parse_text, peer_from_columns, peer_key};
use crate::database::{storage_err, Transaction};

type ScheduleRow = (u16, i32, String, i64, String, i32);

fn into_attribute(row: ScheduleRow) -> Result<ScheduledAttribute, CourierError> {
    let (tag, fire_at, peer_ns, peer_id, namespace, id) = row;
    let namespace: MessageNamespace = parse_text("message namespace", &namespace)?;
    Ok(ScheduledAttribute {
        tag,
        fire_at,
        message_id: MessageId::new(peer_from_columns(&peer_ns, peer_id)?, namespace, id),
    })
}

impl Transaction<'_> {
    pub fn add_timestamp_based_attribute(
        &self,
        tag: u16,
        fire_at: i32,
        message_id: MessageId,
    ) -> Result<(), CourierError> {
        let (ns, peer_id) = peer_key(message_id.peer);
        self.sql()
            .execute(
                "INSERT INTO timestamp_attributes (tag, peer_ns, peer_id, namespace, message_id, fire_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(tag, peer_ns, peer_id, namespace, message_id)
                 DO UPDATE SET fire_at = excluded.fire_at",
                params![
                    tag,
                    ns,
                    peer_id,
                    message_id.namespace.to_string(),
                    message_id.id,
                    fire_at,
                ],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn remove_timestamp_based_attribute(
        &self,
        tag: u16,
        message_id: MessageId,
    ) -> Result<bool, CourierError> {
        let (ns, peer_id) = peer_key(message_id.peer);
        let removed = self
            .sql()
            .execute(
                "DELETE FROM timestamp_attributes
                 WHERE tag = ?1 AND peer_ns = ?2 AND peer_id = ?3 AND namespace = ?4 AND message_id = ?5",
                params![
                    tag,
                    ns,
                    peer_id,
                    message_id.namespace.to_string(),
                    message_id.id,
                ],
            )
            .map_err(storage_err)?;
        Ok(removed > 0)
    }

    /// Entries of `tag` with `fire_at <= now`, earliest first.
    pub fn due_timestamp_based_attributes(
        &self,
        tag: u16,
        now: i32,
    ) -> Result<Vec<ScheduledAttribute>, CourierError> {
        self.query_schedule(
            "SELECT tag, fire_at, peer_ns, peer_id, namespace, message_id FROM timestamp_attributes
             WHERE tag = ?1 AND fire_at <= ?2
             ORDER BY fire_at ASC, peer_ns, peer_id, namespace, message_id",
            params![tag, now],
        )
    }

    /// Every pending entry of `tag`, earliest first.
    pub fn timestamp_based_attributes(&self, tag: u16) -> Result<Vec<ScheduledAttribute>, CourierError> {
        self.query_schedule(
            "SELECT tag, fire_at, peer_ns, peer_id, namespace, message_id FROM timestamp_attributes
             WHERE tag = ?1
             ORDER BY fire_at ASC, peer_ns, peer_id, namespace, message_id",
            params![tag],
        )
    }

    fn query_schedule(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<ScheduledAttribute>, CourierError> {
        let mut stmt = self.sql().prepare(sql).map_err(storage_err)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })
            .map_err(storage_err)?
            .collect::<Result<Vec<ScheduleRow>, _>>()
            .map_err(storage_err)?;
        rows.into_iter().map(into_attribute).collect()
    }
}
